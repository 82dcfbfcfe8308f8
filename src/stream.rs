//! Streaming conversion API: emit pages as they complete.
//!
//! This is the fan-out half of the pipeline. Each selected page becomes one
//! render future; `buffer_unordered` keeps at most `config.concurrency` of
//! them in flight and yields results in completion order. The eager
//! [`crate::convert::convert_pages`] is this stream plus an order-restoring
//! fan-in and the archive writer.
//!
//! Dropping the stream cancels every page that has not started yet; pages
//! already rendering finish on the blocking pool and are discarded.

use crate::config::ConversionConfig;
use crate::engine::{DocumentBytes, RenderEngine};
use crate::error::{PageError, Pdf2ImgError};
use crate::output::PageResult;
use crate::pages::PageSet;
use crate::pipeline::render;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Render every page of `pages`, yielding each result as soon as it is ready.
///
/// The stream yields exactly `pages.len()` items, one per page, in
/// completion order (sort by `page` if order matters).
pub fn render_stream(
    document: DocumentBytes,
    pages: &PageSet,
    config: &ConversionConfig,
    engine: Arc<dyn RenderEngine>,
) -> PageStream {
    let total = pages.len();
    let export = config.export;
    let timeout = config.page_timeout();
    let callback = config.progress_callback.clone();
    let concurrency = config.concurrency.max(1);

    let s = stream::iter(pages.as_slice().to_vec())
        .map(move |page| {
            let engine = Arc::clone(&engine);
            let document = Arc::clone(&document);
            let callback = callback.clone();
            async move {
                if let Some(ref cb) = callback {
                    cb.on_page_start(page, total);
                }
                let result = render::render_page(engine, document, page, export, timeout).await;
                if let Some(ref cb) = callback {
                    match &result {
                        Ok(r) => cb.on_page_complete(page, total, r.data.len()),
                        Err(e) => cb.on_page_error(page, total, &e.to_string()),
                    }
                }
                result
            }
        })
        .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Resolve `spec` against the document and stream the selected pages.
///
/// # Returns
/// - `Ok(PageStream)` — a stream of `Result<PageResult, PageError>`
/// - `Err(Pdf2ImgError)` — the document cannot be opened or the page
///   selection is invalid; nothing has been rendered
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{convert_stream, ConversionConfig, EngineConfig, PdfiumEngine, RenderEngine};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine: Arc<dyn RenderEngine> = Arc::new(PdfiumEngine::acquire(EngineConfig::default())?);
/// let bytes = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::default();
/// let mut stream = convert_stream(bytes.into(), "1-5", &config, engine).await?;
/// while let Some(page) = stream.next().await {
///     match page {
///         Ok(p) => println!("{}: {} bytes", p.entry_name(), p.data.len()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    document: DocumentBytes,
    spec: &str,
    config: &ConversionConfig,
    engine: Arc<dyn RenderEngine>,
) -> Result<PageStream, Pdf2ImgError> {
    let info = render::describe_document(Arc::clone(&engine), Arc::clone(&document)).await?;
    let pages = PageSet::parse(spec, info.page_count)?;
    info!(
        "Streaming {} of {} pages: {}",
        pages.len(),
        info.page_count,
        pages
    );
    Ok(render_stream(document, &pages, config, engine))
}
