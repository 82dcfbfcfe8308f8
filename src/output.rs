//! Result types produced by a conversion.
//!
//! Pages complete in arbitrary order; [`ConversionOutcome`] is the buffer
//! that puts them back in page order and refuses to finish until every
//! dispatched page has reported exactly once.

use crate::error::{PageError, Pdf2ImgError};
use crate::pages::PageSet;
use serde::{Deserialize, Serialize};

/// One successfully rendered and encoded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page: usize,
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// File extension matching the encoding (`png`, `jpg`, `tiff`).
    pub extension: &'static str,
}

impl PageResult {
    /// Archive entry name, e.g. `page_3.png`.
    pub fn entry_name(&self) -> String {
        format!("page_{}.{}", self.page, self.extension)
    }
}

/// A finished ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Entry names in archive order (ascending page).
    pub entries: Vec<String>,
}

impl Archive {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub document_pages: usize,
    /// Pages in the resolved selection.
    pub requested_pages: usize,
    /// Pages written to the archive.
    pub converted_pages: usize,
    /// Pages that failed or timed out.
    pub failed_pages: usize,
    /// Size of the ZIP archive in bytes.
    pub archive_bytes: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub archive_duration_ms: u64,
}

/// Everything a conversion produces.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub archive: Archive,
    /// Per-page failures in ascending page order. Empty on full success.
    pub failures: Vec<PageError>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Treat any page failure as an error.
    pub fn into_result(self) -> Result<Self, Pdf2ImgError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Pdf2ImgError::PartialFailure {
                success: self.stats.converted_pages,
                failed: self.failures.len(),
                total: self.stats.requested_pages,
            })
        }
    }

    /// Pages that did not make it into the archive.
    pub fn failed_pages(&self) -> Vec<usize> {
        self.failures.iter().map(PageError::page).collect()
    }
}

/// Basic facts about a document, returned by [`crate::convert::inspect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_version: Option<String>,
}

type Slot = Option<Result<PageResult, PageError>>;

/// Fan-in buffer: one slot per selected page, addressed by the page's
/// position in the [`PageSet`].
#[derive(Debug)]
pub struct ConversionOutcome {
    pages: PageSet,
    slots: Vec<Slot>,
    reported: usize,
}

impl ConversionOutcome {
    pub fn new(pages: PageSet) -> Self {
        let slots = (0..pages.len()).map(|_| None).collect();
        Self {
            pages,
            slots,
            reported: 0,
        }
    }

    /// Store one page's completion.
    ///
    /// A page outside the selection, or a page reporting twice, is an
    /// internal error.
    pub fn record(&mut self, result: Result<PageResult, PageError>) -> Result<(), Pdf2ImgError> {
        let page = match &result {
            Ok(r) => r.page,
            Err(e) => e.page(),
        };
        let idx = self.pages.position(page).ok_or_else(|| {
            Pdf2ImgError::Internal(format!(
                "page {page} reported but was never dispatched (selection {})",
                self.pages
            ))
        })?;
        let slot = &mut self.slots[idx];
        if slot.is_some() {
            return Err(Pdf2ImgError::Internal(format!(
                "page {page} reported more than once"
            )));
        }
        *slot = Some(result);
        self.reported += 1;
        Ok(())
    }

    pub fn reported(&self) -> usize {
        self.reported
    }

    pub fn is_complete(&self) -> bool {
        self.reported == self.slots.len()
    }

    /// Split into successes and failures, both in ascending page order.
    pub fn finalize(self) -> Result<(Vec<PageResult>, Vec<PageError>), Pdf2ImgError> {
        if !self.is_complete() {
            let missing: Vec<String> = self
                .pages
                .iter()
                .zip(&self.slots)
                .filter(|(_, s)| s.is_none())
                .map(|(p, _)| p.to_string())
                .collect();
            return Err(Pdf2ImgError::Internal(format!(
                "{}/{} pages never reported: {}",
                missing.len(),
                self.slots.len(),
                missing.join(",")
            )));
        }

        let mut results = Vec::with_capacity(self.slots.len());
        let mut failures = Vec::new();
        for slot in self.slots.into_iter().flatten() {
            match slot {
                Ok(r) => results.push(r),
                Err(e) => failures.push(e),
            }
        }
        Ok((results, failures))
    }
}
