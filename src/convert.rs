//! Eager (whole-request) conversion entry points.
//!
//! [`convert_pages`] is the fan-in half of the pipeline: it drains the
//! [`crate::stream::render_stream`] into a [`ConversionOutcome`], which puts
//! completions back in page order and refuses to finish until every page has
//! reported, then writes the archive. Use [`crate::stream::convert_stream`]
//! instead when you want pages progressively.

use crate::config::ConversionConfig;
use crate::engine::{DocumentBytes, RenderEngine};
use crate::error::Pdf2ImgError;
use crate::output::{ConversionOutcome, ConversionOutput, ConversionStats, DocumentInfo};
use crate::pages::PageSet;
use crate::pipeline::{archive, input, render};
use crate::stream::render_stream;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert the pages of `document` selected by `spec` into a ZIP archive.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages failed
/// (check `output.failures`, or call [`ConversionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Pdf2ImgError)` only for fatal errors:
/// - the engine cannot open the document
/// - the page selection is invalid (nothing is rendered)
/// - every selected page failed
/// - the archive could not be assembled
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{convert, ConversionConfig, EngineConfig, PdfiumEngine, RenderEngine};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine: Arc<dyn RenderEngine> = Arc::new(PdfiumEngine::acquire(EngineConfig::default())?);
/// let bytes = std::fs::read("document.pdf")?;
/// let output = convert(bytes.into(), "1-3,5", &ConversionConfig::default(), engine).await?;
/// std::fs::write("document.zip", &output.archive.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(
    document: DocumentBytes,
    spec: &str,
    config: &ConversionConfig,
    engine: Arc<dyn RenderEngine>,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let total_start = Instant::now();

    // ── Step 1: Count pages ──────────────────────────────────────────────
    let info = render::describe_document(Arc::clone(&engine), Arc::clone(&document)).await?;
    debug!("Document has {} pages", info.page_count);

    // ── Step 2: Resolve the page selection ───────────────────────────────
    let pages = PageSet::parse(spec, info.page_count)?;

    // ── Step 3: Render and archive ───────────────────────────────────────
    let mut output = convert_pages(document, &pages, config, engine).await?;
    output.stats.document_pages = info.page_count;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Render an already-resolved page selection and archive the results.
///
/// `stats.document_pages` is left at zero; [`convert`] fills it in.
pub async fn convert_pages(
    document: DocumentBytes,
    pages: &PageSet,
    config: &ConversionConfig,
    engine: Arc<dyn RenderEngine>,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let start = Instant::now();
    let requested = pages.len();
    info!(
        "Converting {} pages {} as {} at {} DPI",
        requested, pages, config.export.format, config.export.resolution
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(requested);
    }

    // ── Fan-out / fan-in ─────────────────────────────────────────────────
    let mut outcome = ConversionOutcome::new(pages.clone());
    let mut stream = render_stream(document, pages, config, engine);
    while let Some(result) = stream.next().await {
        outcome.record(result)?;
    }
    let render_duration_ms = start.elapsed().as_millis() as u64;

    let (results, failures) = outcome.finalize()?;
    for failure in &failures {
        warn!("{}", failure);
    }

    if results.is_empty() && !failures.is_empty() {
        return Err(Pdf2ImgError::AllPagesFailed {
            total: requested,
            first_error: failures[0].to_string(),
        });
    }

    // ── Archive ──────────────────────────────────────────────────────────
    let archive_start = Instant::now();
    let converted = results.len();
    let archive = tokio::task::spawn_blocking(move || archive::build_archive(&results))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Archive task panicked: {}", e)))??;
    let archive_duration_ms = archive_start.elapsed().as_millis() as u64;

    let stats = ConversionStats {
        document_pages: 0,
        requested_pages: requested,
        converted_pages: converted,
        failed_pages: failures.len(),
        archive_bytes: archive.len(),
        total_duration_ms: start.elapsed().as_millis() as u64,
        render_duration_ms,
        archive_duration_ms,
    };

    info!(
        "Conversion complete: {}/{} pages, {} bytes, {}ms",
        converted, requested, stats.archive_bytes, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(requested, converted);
    }

    Ok(ConversionOutput {
        archive,
        failures,
        stats,
    })
}

/// Convert a PDF file or URL and write the archive to `output_path`.
///
/// Uses an atomic write (temp file in the target directory + rename) so a
/// failed conversion never leaves a truncated archive behind.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    spec: &str,
    config: &ConversionConfig,
    engine: Arc<dyn RenderEngine>,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let loaded = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    info!("Starting conversion: {}", input_str.as_ref());
    let output = convert(loaded.bytes, spec, config, engine).await?;

    let path = output_path.as_ref().to_path_buf();
    let bytes = output.archive.bytes.clone();
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Write task panicked: {}", e)))??;

    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    document: DocumentBytes,
    spec: &str,
    config: &ConversionConfig,
    engine: Arc<dyn RenderEngine>,
) -> Result<ConversionOutput, Pdf2ImgError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(document, spec, config, engine))
}

/// Page count and metadata without rendering anything.
pub async fn inspect(
    document: DocumentBytes,
    engine: Arc<dyn RenderEngine>,
) -> Result<DocumentInfo, Pdf2ImgError> {
    render::describe_document(engine, document).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2ImgError> {
    use std::io::Write;

    let write_err = |source: std::io::Error| Pdf2ImgError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/doc.zip");
        write_atomic(&path, b"PK\x05\x06").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK\x05\x06");

        // Only the final file remains in the target directory.
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.zip");
        std::fs::write(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
