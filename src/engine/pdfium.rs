//! pdfium-backed [`RenderEngine`].
//!
//! pdfium is not re-entrant, so one dedicated thread owns the bound library
//! for the engine's whole life. Callers submit jobs over a channel and block
//! on a per-job reply channel; the worker rasterises and hands the bitmap
//! back, and encoding then happens on the caller's thread.
//!
//! Only one page is admitted at a time (see [`RenderEngine::admission`]), so
//! the job queue never holds work for pages that have timed out or been
//! cancelled while waiting.
//!
//! The worker keeps the last few opened documents loaded, so rendering
//! twenty pages of one upload parses the PDF once rather than twenty times,
//! even while another request's pages are interleaved with it. A cached
//! document is dropped once no caller holds its bytes any more.

use super::encode::encode_page;
use super::{DocumentBytes, EngineError, RenderEngine};
use crate::config::ExportOptions;
use crate::error::Pdf2ImgError;
use crate::output::DocumentInfo;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// How long the worker idles before checking whether its cached documents
/// can be released.
const IDLE_POLL: Duration = Duration::from_secs(2);

/// Open documents kept by the worker.
const DOCUMENT_CACHE_SIZE: usize = 3;

/// Settings for [`PdfiumEngine::acquire`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit path to the pdfium shared library. When `None` the engine
    /// tries `PDFIUM_LIB_PATH`, then the executable's directory, then the
    /// working directory, then the system library path.
    pub library_path: Option<PathBuf>,

    /// Longest edge of a rendered page in pixels. Default: 10 000.
    ///
    /// A 300 DPI render of an A0 poster would be ~10 000 × 14 000 px; the cap
    /// keeps one pathological page from exhausting memory.
    pub max_rendered_pixels: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            max_rendered_pixels: 10_000,
        }
    }
}

type Reply<T> = Sender<Result<T, EngineError>>;

enum Job {
    Describe {
        document: DocumentBytes,
        reply: Reply<DocumentInfo>,
    },
    Rasterize {
        document: DocumentBytes,
        page: usize,
        dpi: u32,
        reply: Reply<DynamicImage>,
    },
}

/// Handle to a pdfium worker thread.
///
/// Create with [`PdfiumEngine::acquire`]; shut down with
/// [`PdfiumEngine::release`] or by dropping the last handle.
pub struct PdfiumEngine {
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    admission: Arc<Semaphore>,
}

impl PdfiumEngine {
    /// Bind pdfium on a new worker thread.
    ///
    /// Fails with [`Pdf2ImgError::EngineUnavailable`] when no usable pdfium
    /// library can be found.
    pub fn acquire(config: EngineConfig) -> Result<Self, Pdf2ImgError> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let worker = thread::Builder::new()
            .name("pdfium-render".into())
            .spawn(move || {
                let pdfium = match bind_pdfium(config.library_path.as_deref()) {
                    Ok(pdfium) => {
                        let _ = ready_tx.send(Ok(()));
                        pdfium
                    }
                    Err(reason) => {
                        let _ = ready_tx.send(Err(reason));
                        return;
                    }
                };
                run_worker(&pdfium, job_rx, config.max_rendered_pixels);
                debug!("pdfium worker stopped");
            })
            .map_err(|e| {
                Pdf2ImgError::EngineUnavailable(format!("cannot spawn render thread: {e}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("pdfium engine ready");
                Ok(Self {
                    jobs: Some(job_tx),
                    worker: Some(worker),
                    admission: Arc::new(Semaphore::new(1)),
                })
            }
            Ok(Err(reason)) => {
                let _ = worker.join();
                Err(Pdf2ImgError::EngineUnavailable(reason))
            }
            Err(_) => {
                let _ = worker.join();
                Err(Pdf2ImgError::EngineUnavailable(
                    "render thread exited during startup".into(),
                ))
            }
        }
    }

    /// Stop the worker thread and wait for it to exit.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Pages waiting for admission fail instead of waiting forever.
        self.admission.close();
        // Closing the channel ends the worker's receive loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("pdfium worker panicked during shutdown");
            }
        }
    }

    fn submit<T>(&self, make: impl FnOnce(Reply<T>) -> Job) -> Result<T, EngineError> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("engine has been released".into()))?;
        let (reply_tx, reply_rx) = mpsc::channel();
        jobs.send(make(reply_tx))
            .map_err(|_| EngineError::Unavailable("render thread has stopped".into()))?;
        reply_rx
            .recv()
            .map_err(|_| EngineError::Unavailable("render thread dropped the job".into()))?
    }
}

impl Drop for PdfiumEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PdfiumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumEngine")
            .field("running", &self.jobs.is_some())
            .finish()
    }
}

impl RenderEngine for PdfiumEngine {
    fn page_count(&self, document: &DocumentBytes) -> Result<usize, EngineError> {
        self.describe(document).map(|info| info.page_count)
    }

    fn render_page(
        &self,
        document: &DocumentBytes,
        page: usize,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, EngineError> {
        let image = self.submit(|reply| Job::Rasterize {
            document: Arc::clone(document),
            page,
            dpi: options.resolution,
            reply,
        })?;
        encode_page(&image, options.format, options.quality).map_err(|e| EngineError::Encode {
            page,
            detail: e.to_string(),
        })
    }

    fn admission(&self) -> Option<Arc<Semaphore>> {
        Some(Arc::clone(&self.admission))
    }

    fn describe(&self, document: &DocumentBytes) -> Result<DocumentInfo, EngineError> {
        self.submit(|reply| Job::Describe {
            document: Arc::clone(document),
            reply,
        })
    }
}

// ── Library binding ──────────────────────────────────────────────────────

fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, String> {
    if let Some(path) = explicit {
        return bind_at(path);
    }
    if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH").filter(|p| !p.is_empty()) {
        return bind_at(Path::new(&path));
    }

    let mut candidates = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(&dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    for candidate in &candidates {
        if candidate.exists() {
            match bind_at(candidate) {
                Ok(pdfium) => return Ok(pdfium),
                Err(e) => warn!("{}", e),
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| format!("no pdfium library found locally or on the system: {e:?}"))
}

fn bind_at(path: &Path) -> Result<Pdfium, String> {
    debug!("Binding pdfium from {}", path.display());
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| format!("cannot bind pdfium from '{}': {e:?}", path.display()))
}

// ── Worker ───────────────────────────────────────────────────────────────

fn run_worker(pdfium: &Pdfium, jobs: Receiver<Job>, max_pixels: u32) {
    let mut cache: DocumentCache<PdfDocument<'_>> = DocumentCache::new(DOCUMENT_CACHE_SIZE);

    loop {
        let job = match jobs.recv_timeout(IDLE_POLL) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => {
                let released = cache.release_unused();
                if released > 0 {
                    debug!("Released {} idle document(s)", released);
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match job {
            Job::Describe { document, reply } => {
                let result = guarded(|| {
                    let doc = load(pdfium, &mut cache, &document)?;
                    Ok(describe(doc, document.len()))
                });
                let _ = reply.send(result);
            }
            Job::Rasterize {
                document,
                page,
                dpi,
                reply,
            } => {
                let result = guarded(|| {
                    let doc = load(pdfium, &mut cache, &document)?;
                    rasterize(doc, page, dpi, max_pixels)
                })
                .map_err(|e| match e {
                    EngineError::Unavailable(detail) => EngineError::Render { page, detail },
                    other => other,
                });
                let _ = reply.send(result);
            }
        }
    }
}

/// Run one job, turning a pdfium panic into an error so the worker survives.
fn guarded<T>(job: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        Err(EngineError::Unavailable(format!("pdfium panicked: {detail}")))
    })
}

fn load<'a, 'c>(
    pdfium: &'a Pdfium,
    cache: &'c mut DocumentCache<PdfDocument<'a>>,
    document: &DocumentBytes,
) -> Result<&'c PdfDocument<'a>, EngineError> {
    cache.get_or_load(document, || {
        let doc = pdfium
            .load_pdf_from_byte_vec(document.to_vec(), None)
            .map_err(|e| EngineError::Load(format!("{e:?}")))?;
        debug!("Loaded document: {} pages", doc.pages().len());
        Ok(doc)
    })
}

/// Most-recently-used list of open documents, keyed by the identity of the
/// caller's byte buffer.
struct DocumentCache<D> {
    entries: Vec<(DocumentBytes, D)>,
    capacity: usize,
}

impl<D> DocumentCache<D> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Drop documents whose bytes are held by nobody but the cache. No later
    /// job can refer to them again.
    fn release_unused(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(bytes, _)| Arc::strong_count(bytes) > 1);
        before - self.entries.len()
    }

    fn get_or_load(
        &mut self,
        document: &DocumentBytes,
        load: impl FnOnce() -> Result<D, EngineError>,
    ) -> Result<&D, EngineError> {
        self.release_unused();
        match self
            .entries
            .iter()
            .position(|(bytes, _)| Arc::ptr_eq(bytes, document))
        {
            Some(0) => {}
            Some(pos) => {
                let entry = self.entries.remove(pos);
                self.entries.insert(0, entry);
            }
            None => {
                // Close the least recently used document before opening the next one.
                self.entries.truncate(self.capacity - 1);
                let doc = load()?;
                self.entries.insert(0, (Arc::clone(document), doc));
            }
        }
        self.entries
            .first()
            .map(|(_, doc)| doc)
            .ok_or_else(|| EngineError::Load("document cache is empty".into()))
    }
}

fn describe(doc: &PdfDocument<'_>, size_bytes: usize) -> DocumentInfo {
    let metadata = doc.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    DocumentInfo {
        page_count: doc.pages().len() as usize,
        size_bytes,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        pdf_version: Some(format!("{:?}", doc.version())),
    }
}

fn rasterize(
    doc: &PdfDocument<'_>,
    page: usize,
    dpi: u32,
    max_pixels: u32,
) -> Result<DynamicImage, EngineError> {
    let pages = doc.pages();
    let total = pages.len() as usize;
    if page == 0 || page > total {
        return Err(EngineError::PageMissing { page, total });
    }

    let pdf_page = pages
        .get((page - 1) as PdfPageIndex)
        .map_err(|e| EngineError::Render {
            page,
            detail: format!("{:?}", e),
        })?;

    // PDF user space is 72 units per inch.
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| EngineError::Render {
            page,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} at {} DPI → {}x{} px",
        page,
        dpi,
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = EngineConfig::default();
        assert!(c.library_path.is_none());
        assert_eq!(c.max_rendered_pixels, 10_000);
    }

    #[test]
    fn missing_library_is_engine_unavailable() {
        let err = PdfiumEngine::acquire(EngineConfig {
            library_path: Some(PathBuf::from("/nonexistent/libpdfium.so")),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, Pdf2ImgError::EngineUnavailable(_)), "{err}");
        assert!(err.to_string().contains("/nonexistent/libpdfium.so"));
    }

    fn bytes(tag: &str) -> DocumentBytes {
        Arc::from(tag.as_bytes())
    }

    #[test]
    fn cache_keeps_interleaved_documents_open() {
        let mut cache: DocumentCache<String> = DocumentCache::new(3);
        let (a, b) = (bytes("a"), bytes("b"));
        let mut loads = 0;

        for doc in [&a, &b, &a, &b, &a] {
            let name = cache
                .get_or_load(doc, || {
                    loads += 1;
                    Ok(String::from_utf8_lossy(doc).into_owned())
                })
                .unwrap()
                .clone();
            assert_eq!(name.as_bytes(), &doc[..]);
        }
        assert_eq!(loads, 2);
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache: DocumentCache<usize> = DocumentCache::new(2);
        let docs = [bytes("1"), bytes("2"), bytes("3")];
        let mut loads = 0;
        let mut get = |cache: &mut DocumentCache<usize>, i: usize| {
            *cache
                .get_or_load(&docs[i], || {
                    loads += 1;
                    Ok(i)
                })
                .unwrap()
        };

        get(&mut cache, 0);
        get(&mut cache, 1);
        get(&mut cache, 0);
        get(&mut cache, 2); // evicts 1
        get(&mut cache, 0);
        get(&mut cache, 1);
        drop(get);
        assert_eq!(loads, 4);
    }

    #[test]
    fn cache_releases_documents_nobody_holds() {
        let mut cache: DocumentCache<()> = DocumentCache::new(3);
        let kept = bytes("kept");
        let gone = bytes("gone");
        cache.get_or_load(&kept, || Ok(())).unwrap();
        cache.get_or_load(&gone, || Ok(())).unwrap();
        drop(gone);

        assert_eq!(cache.release_unused(), 1);
        assert_eq!(cache.entries.len(), 1);
        assert!(Arc::ptr_eq(&cache.entries[0].0, &kept));
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache: DocumentCache<()> = DocumentCache::new(3);
        let doc = bytes("broken");
        let err = cache
            .get_or_load(&doc, || Err(EngineError::Load("bad xref".into())))
            .unwrap_err();
        assert_eq!(err, EngineError::Load("bad xref".into()));
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn guarded_turns_panics_into_errors() {
        let r: Result<(), EngineError> = guarded(|| panic!("bad xref"));
        match r {
            Err(EngineError::Unavailable(detail)) => assert!(detail.contains("bad xref")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
