//! ZIP assembly.
//!
//! Entries are written once, in ascending page order, with a fixed timestamp
//! and fixed permissions. Identical pages therefore produce byte-identical
//! archives no matter when or in which order the pages were rendered.

use crate::error::Pdf2ImgError;
use crate::output::{Archive, PageResult};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Incremental archive writer. Pages must be appended in strictly ascending
/// order.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    last_page: Option<usize>,
    entries: Vec<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            // DateTime::default() is the DOS epoch, 1980-01-01 00:00:00.
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            last_page: None,
            entries: Vec::new(),
        }
    }

    /// Write one page as `page_<n>.<ext>`.
    pub fn append(&mut self, page: &PageResult) -> Result<(), Pdf2ImgError> {
        if let Some(last) = self.last_page {
            if page.page <= last {
                return Err(Pdf2ImgError::Internal(format!(
                    "archive entries out of order: page {} after page {}",
                    page.page, last
                )));
            }
        }

        let name = page.entry_name();
        self.writer
            .start_file(name.as_str(), self.options)
            .map_err(archive_err)?;
        self.writer.write_all(&page.data).map_err(|e| Pdf2ImgError::ArchiveFailed {
            detail: format!("{name}: {e}"),
        })?;

        debug!("Archived {} ({} bytes)", name, page.data.len());
        self.last_page = Some(page.page);
        self.entries.push(name);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the central directory and return the archive.
    pub fn finish(self) -> Result<Archive, Pdf2ImgError> {
        let cursor = self.writer.finish().map_err(archive_err)?;
        Ok(Archive {
            bytes: cursor.into_inner(),
            entries: self.entries,
        })
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an archive from pages already sorted by page number.
pub fn build_archive(pages: &[PageResult]) -> Result<Archive, Pdf2ImgError> {
    let mut builder = ArchiveBuilder::new();
    for page in pages {
        builder.append(page)?;
    }
    builder.finish()
}

fn archive_err(e: zip::result::ZipError) -> Pdf2ImgError {
    Pdf2ImgError::ArchiveFailed {
        detail: e.to_string(),
    }
}
