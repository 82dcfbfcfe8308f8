//! One render task: rasterise and encode a single page.
//!
//! ## Why spawn_blocking?
//!
//! Engine calls block (pdfium work plus image encoding) and are CPU-heavy.
//! `tokio::task::spawn_blocking` moves them onto the blocking pool so the
//! Tokio worker threads keep serving other requests while pages render.
//!
//! Every failure mode of the task (engine error, panic, timeout) becomes a
//! [`PageError`] for that page alone.

use crate::config::ExportOptions;
use crate::engine::{DocumentBytes, RenderEngine};
use crate::error::{PageError, Pdf2ImgError};
use crate::output::{DocumentInfo, PageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Ask the engine for the document's page count and metadata.
///
/// A document the engine cannot open is the caller's problem, so engine
/// errors surface as [`Pdf2ImgError::DocumentLoad`].
pub async fn describe_document(
    engine: Arc<dyn RenderEngine>,
    document: DocumentBytes,
) -> Result<DocumentInfo, Pdf2ImgError> {
    tokio::task::spawn_blocking(move || engine.describe(&document))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Describe task panicked: {}", e)))?
        .map_err(|e| Pdf2ImgError::DocumentLoad {
            detail: e.to_string(),
        })
}

/// Render `page` of `document` with a per-page `timeout`.
///
/// When the engine has an admission gate, the page first waits for a permit
/// and the timeout only covers the time after it is granted. The permit
/// travels with the blocking call, so the engine stays busy until that call
/// really returns.
///
/// On timeout the blocking task is abandoned: it runs to completion on the
/// pool and its result is discarded.
pub async fn render_page(
    engine: Arc<dyn RenderEngine>,
    document: DocumentBytes,
    page: usize,
    export: ExportOptions,
    timeout: Duration,
) -> Result<PageResult, PageError> {
    let permit = match engine.admission() {
        Some(gate) => Some(gate.acquire_owned().await.map_err(|_| PageError::RenderFailed {
            page,
            detail: "render engine has shut down".into(),
        })?),
        None => None,
    };

    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        engine.render_page(&document, page, &export)
    });

    let data = match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            return Err(PageError::Timeout {
                page,
                secs: timeout.as_secs(),
            })
        }
        Ok(Err(join_err)) => {
            return Err(PageError::RenderFailed {
                page,
                detail: format!("render task panicked: {}", join_err),
            })
        }
        Ok(Ok(Err(engine_err))) => {
            return Err(PageError::RenderFailed {
                page,
                detail: engine_err.to_string(),
            })
        }
        Ok(Ok(Ok(data))) => data,
    };

    debug!("Page {} → {} bytes", page, data.len());
    Ok(PageResult {
        page,
        data,
        extension: export.format.extension(),
    })
}
