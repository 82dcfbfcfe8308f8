//! Input resolution: load a user-supplied path or URL into memory.
//!
//! pdfium opens documents straight from a byte buffer, so both inputs end up
//! as a shared [`DocumentBytes`] buffer. The `%PDF-` magic is checked before
//! returning so callers get a meaningful error instead of a pdfium failure.

use crate::engine::DocumentBytes;
use crate::error::Pdf2ImgError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Archive name used when the document name is unknown or unusable.
pub const DEFAULT_ARCHIVE_STEM: &str = "converted_images";

/// A document loaded into memory.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// File stem of the source, e.g. `report` for `/tmp/report.pdf`.
    pub name: String,
    pub bytes: DocumentBytes,
}

impl LoadedDocument {
    /// Suggested archive file name, e.g. `report.zip`.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.name)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Stem of a file name with any directory part removed, or
/// [`DEFAULT_ARCHIVE_STEM`] when nothing usable is left.
pub fn document_stem(file_name: &str) -> String {
    // Uploads may carry Windows paths.
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('.'))
        .map(|s| s.replace('"', ""))
        .unwrap_or_else(|| DEFAULT_ARCHIVE_STEM.to_string())
}

/// Archive file name suggested for an input path or URL, e.g.
/// `https://host/papers/attention.pdf` → `attention.zip`.
pub fn default_archive_name(input: &str) -> String {
    let stem = if is_url(input) {
        extract_filename(input)
            .map(|f| document_stem(&f))
            .unwrap_or_else(|| "downloaded".to_string())
    } else {
        document_stem(input)
    };
    format!("{stem}.zip")
}

/// Verify the buffer starts with the PDF signature.
pub fn ensure_pdf(bytes: &[u8], origin: &str) -> Result<(), Pdf2ImgError> {
    if bytes.starts_with(b"%PDF-") {
        Ok(())
    } else {
        Err(Pdf2ImgError::NotAPdf {
            origin: origin.to_string(),
            magic: bytes.iter().take(8).copied().collect(),
        })
    }
}

/// Resolve the input string to an in-memory PDF.
///
/// URLs are downloaded; anything else is read as a local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, Pdf2ImgError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.contains("://") {
        Err(Pdf2ImgError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<LoadedDocument, Pdf2ImgError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2ImgError::PermissionDenied { path: path.clone() },
        _ => Pdf2ImgError::FileNotFound { path: path.clone() },
    })?;
    ensure_pdf(&bytes, path_str)?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedDocument {
        name: document_stem(path_str),
        bytes: bytes.into(),
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, Pdf2ImgError> {
    info!("Downloading PDF from: {}", url);

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2ImgError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2ImgError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(map_err)?;

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(Pdf2ImgError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = extract_filename(url)
        .map(|f| document_stem(&f))
        .unwrap_or_else(|| "downloaded".to_string());

    let bytes = response.bytes().await.map_err(map_err)?;
    ensure_pdf(&bytes, url)?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(LoadedDocument {
        name,
        bytes: DocumentBytes::from(&bytes[..]),
    })
}

/// Last path segment of the URL when it looks like a file name.
fn extract_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}
