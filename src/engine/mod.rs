//! Render-engine seam.
//!
//! The pipeline never touches pdfium directly. It talks to an
//! `Arc<dyn RenderEngine>`, which lets the HTTP server share one engine
//! across requests and lets tests substitute a fake.
//!
//! Engine methods are blocking and are always called from Tokio's blocking
//! pool (see [`crate::pipeline::render`]).

pub mod encode;
pub mod pdfium;

use crate::config::ExportOptions;
use crate::output::DocumentInfo;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

pub use pdfium::{EngineConfig, PdfiumEngine};

/// Read-only document bytes shared by every page task of one conversion.
pub type DocumentBytes = Arc<[u8]>;

/// Failure reported by a [`RenderEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The document could not be opened.
    #[error("cannot open document: {0}")]
    Load(String),

    /// The requested page does not exist.
    #[error("page {page} does not exist (document has {total} pages)")]
    PageMissing { page: usize, total: usize },

    /// Rasterisation failed.
    #[error("page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// The rendered bitmap could not be encoded.
    #[error("page {page}: encoding failed: {detail}")]
    Encode { page: usize, detail: String },

    /// The engine has shut down or never started.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Rasterises document pages into encoded images.
pub trait RenderEngine: Send + Sync {
    /// Number of pages in `document`.
    fn page_count(&self, document: &DocumentBytes) -> Result<usize, EngineError>;

    /// Render 1-based `page` at `options.resolution` DPI and encode it as
    /// `options.format`.
    fn render_page(
        &self,
        document: &DocumentBytes,
        page: usize,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, EngineError>;

    /// Gate shared by every caller of this engine, sized to the number of
    /// pages it can really work on at once. `None` means no limit.
    ///
    /// The pipeline holds a permit for the whole [`RenderEngine::render_page`]
    /// call, and the per-page timeout starts only once the permit is granted.
    /// Pages still waiting for a permit when their conversion is dropped are
    /// never handed to the engine.
    fn admission(&self) -> Option<Arc<Semaphore>> {
        None
    }

    /// Page count plus whatever metadata the engine can extract.
    fn describe(&self, document: &DocumentBytes) -> Result<DocumentInfo, EngineError> {
        Ok(DocumentInfo {
            page_count: self.page_count(document)?,
            size_bytes: document.len(),
            ..Default::default()
        })
    }
}
