//! Error types for the edgequake-pdf2img library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Pdf2ImgError`] — **Fatal**: the request cannot produce an archive
//!   (unreadable input, bad page selection, every page failed, the archive
//!   could not be written). Returned as `Err(Pdf2ImgError)` from the
//!   top-level `convert*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed to render or timed
//!   out while its siblings are fine. Collected in
//!   [`crate::output::ConversionOutput::failures`] so callers can inspect
//!   partial success instead of losing the whole archive to one bad page.
//!
//! * [`PageSpecError`] — the page-selection expression is invalid. Always
//!   the caller's fault, always reported before any rendering starts.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2img library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::ConversionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{origin}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { origin: String, magic: Vec<u8> },

    // ── Document errors ───────────────────────────────────────────────────
    /// The render engine could not open the document.
    #[error("Failed to load PDF document: {detail}")]
    DocumentLoad { detail: String },

    /// The page selection is malformed or out of range.
    #[error("Invalid page indices: {0}")]
    InvalidPageSpec(#[from] PageSpecError),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// Every requested page failed; the archive would be empty.
    #[error("All {total} pages failed to render.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    /// Serialising the ZIP container failed.
    #[error("Failed to assemble archive: {detail}")]
    ArchiveFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output archive file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library or the engine has shut down.
    #[error(
        "PDF render engine unavailable: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to point\n\
at an existing copy of the pdfium shared library.\n"
    )]
    EngineUnavailable(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2ImgError {
    /// `true` when the error was caused by the caller's input rather than by
    /// the service. The HTTP layer maps these to `400 Bad Request`.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Pdf2ImgError::FileNotFound { .. }
                | Pdf2ImgError::PermissionDenied { .. }
                | Pdf2ImgError::InvalidInput { .. }
                | Pdf2ImgError::NotAPdf { .. }
                | Pdf2ImgError::DocumentLoad { .. }
                | Pdf2ImgError::InvalidPageSpec(_)
                | Pdf2ImgError::InvalidConfig(_)
        )
    }
}

/// A non-fatal error for a single page.
///
/// The overall conversion continues unless ALL pages fail.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The render engine failed (or panicked) on this page.
    #[error("Page {page}: rendering failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The render task did not finish within the per-page timeout.
    #[error("Page {page}: rendering timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// The 1-based page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// Which end of an `A-B` range was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

impl std::fmt::Display for RangeBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeBound::Start => f.write_str("start"),
            RangeBound::End => f.write_str("end"),
        }
    }
}

/// A page-selection expression that cannot be resolved against the document.
///
/// Messages name the offending term so they can be shown to end users as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageSpecError {
    /// The selection was empty or whitespace only.
    #[error("empty page selection")]
    Empty,

    /// A single page number outside `1..=total`.
    #[error("invalid page index: {page}, from input: {spec}, max supported page: {total}")]
    OutOfRange {
        page: usize,
        spec: String,
        total: usize,
    },

    /// An explicit range bound outside `1..=total` (or not a number).
    #[error("invalid {bound} page range: {term}")]
    InvalidRangeBound { bound: RangeBound, term: String },

    /// A range whose start lies after its end.
    #[error("invalid page range: {term}, start index is after ending index")]
    ReversedRange { term: String },

    /// Neither a page number nor a range.
    #[error("invalid page index or range: {term}")]
    MalformedTerm { term: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_display() {
        let e = Pdf2ImgError::PartialFailure {
            success: 9,
            failed: 1,
            total: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("1/10"), "got: {msg}");
    }

    #[test]
    fn all_pages_failed_display() {
        let e = Pdf2ImgError::AllPagesFailed {
            total: 3,
            first_error: "Page 1: rendering failed: boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3 pages"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn page_spec_error_wraps_with_prefix() {
        let e: Pdf2ImgError = PageSpecError::MalformedTerm { term: "a".into() }.into();
        assert_eq!(
            e.to_string(),
            "Invalid page indices: invalid page index or range: a"
        );
        assert!(e.is_client_error());
    }

    #[test]
    fn range_bound_display() {
        let e = PageSpecError::InvalidRangeBound {
            bound: RangeBound::End,
            term: "3-99".into(),
        };
        assert_eq!(e.to_string(), "invalid end page range: 3-99");
    }

    #[test]
    fn page_error_reports_its_page() {
        let e = PageError::Timeout { page: 7, secs: 30 };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn server_side_errors_are_not_client_errors() {
        assert!(!Pdf2ImgError::Internal("x".into()).is_client_error());
        assert!(!Pdf2ImgError::ArchiveFailed { detail: "x".into() }.is_client_error());
    }
}
