//! Shared helpers for integration tests: a scriptable in-memory engine.

#![allow(dead_code)]

use edgequake_pdf2img::{DocumentBytes, EngineError, ExportOptions, RenderEngine};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Minimal byte buffer that passes the `%PDF-` signature check.
pub fn fake_pdf() -> DocumentBytes {
    Arc::from(&b"%PDF-1.7\n% fake document for tests\n%%EOF\n"[..])
}

/// Render engine that never touches pdfium.
///
/// Each page's bytes are `page-<n>-<ext>-<dpi>-<quality>`, so tests can check
/// that options are passed through untouched.
#[derive(Default)]
pub struct FakeEngine {
    pub total_pages: usize,
    /// Pages whose render returns an error.
    pub failing: HashSet<usize>,
    /// Pages whose render panics.
    pub panicking: HashSet<usize>,
    /// Per-page artificial render time.
    pub delays: HashMap<usize, Duration>,
    pub calls: AtomicUsize,
    pub page_count_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// One-at-a-time engine: renders hold `serial` and callers are admitted
    /// through `gate`, like pdfium's single worker.
    pub gate: Option<Arc<Semaphore>>,
    pub serial: Mutex<()>,
}

impl FakeEngine {
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            ..Default::default()
        }
    }

    pub fn failing(mut self, pages: &[usize]) -> Self {
        self.failing.extend(pages.iter().copied());
        self
    }

    pub fn panicking(mut self, pages: &[usize]) -> Self {
        self.panicking.extend(pages.iter().copied());
        self
    }

    pub fn delay(mut self, page: usize, delay: Duration) -> Self {
        self.delays.insert(page, delay);
        self
    }

    /// Render one page at a time behind a single-permit admission gate.
    pub fn serialized(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(1)));
        self
    }

    /// Make every page take `delay`.
    pub fn uniform_delay(mut self, delay: Duration) -> Self {
        for page in 1..=self.total_pages {
            self.delays.insert(page, delay);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn expected_bytes(page: usize, options: &ExportOptions) -> Vec<u8> {
        format!(
            "page-{}-{}-{}-{}",
            page,
            options.format.extension(),
            options.resolution,
            options.quality
        )
        .into_bytes()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RenderEngine for FakeEngine {
    fn page_count(&self, _document: &DocumentBytes) -> Result<usize, EngineError> {
        self.page_count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.total_pages)
    }

    fn render_page(
        &self,
        _document: &DocumentBytes,
        page: usize,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, EngineError> {
        let _serial = self
            .gate
            .as_ref()
            .map(|_| self.serial.lock().unwrap_or_else(|e| e.into_inner()));
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delays.get(&page) {
            std::thread::sleep(*delay);
        }
        if self.panicking.contains(&page) {
            panic!("simulated crash on page {page}");
        }
        if self.failing.contains(&page) {
            return Err(EngineError::Render {
                page,
                detail: "simulated failure".into(),
            });
        }
        if page == 0 || page > self.total_pages {
            return Err(EngineError::PageMissing {
                page,
                total: self.total_pages,
            });
        }
        Ok(Self::expected_bytes(page, options))
    }

    fn admission(&self) -> Option<Arc<Semaphore>> {
        self.gate.clone()
    }
}

/// Engine whose document cannot be opened.
pub struct BrokenEngine;

impl RenderEngine for BrokenEngine {
    fn page_count(&self, _document: &DocumentBytes) -> Result<usize, EngineError> {
        Err(EngineError::Load("trailer not found".into()))
    }

    fn render_page(
        &self,
        _document: &DocumentBytes,
        page: usize,
        _options: &ExportOptions,
    ) -> Result<Vec<u8>, EngineError> {
        Err(EngineError::Render {
            page,
            detail: "unreachable".into(),
        })
    }
}

/// Read an archive back as `(entry name, bytes)` pairs in archive order.
pub fn read_zip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).expect("valid zip");
    (0..zip.len())
        .map(|i| {
            let mut f = zip.by_index(i).expect("entry");
            let mut data = Vec::new();
            f.read_to_end(&mut data).expect("read entry");
            (f.name().to_string(), data)
        })
        .collect()
}
