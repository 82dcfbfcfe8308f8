//! # edgequake-pdf2img
//!
//! Render selected pages of a PDF to PNG, JPEG or TIFF and bundle them into a
//! single deterministic ZIP archive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes + "1-3,5,7-"
//!  │
//!  ├─ 1. Pages    parse the selection against the page count → [1,2,3,5,7,8,…]
//!  ├─ 2. Render   one task per page on the blocking pool, bounded concurrency
//!  ├─ 3. Collect  completions land in page-indexed slots; failures isolated
//!  └─ 4. Archive  page_1.png, page_2.png, … in ascending order, fixed metadata
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{convert, ConversionConfig, EngineConfig, ExportFormat, PdfiumEngine, RenderEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine: Arc<dyn RenderEngine> = Arc::new(PdfiumEngine::acquire(EngineConfig::default())?);
//!     let config = ConversionConfig::builder()
//!         .format(ExportFormat::Jpeg)
//!         .resolution(150)
//!         .build()?;
//!
//!     let pdf = std::fs::read("document.pdf")?;
//!     let output = convert(pdf.into(), "1-3,5", &config, engine).await?;
//!     std::fs::write("document.zip", &output.archive.bytes)?;
//!     eprintln!("{} pages archived, {} failed",
//!         output.stats.converted_pages,
//!         output.stats.failed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP service ([`server`]) |
//! | `cli`    | on      | The `pdf2img` binary (clap + anyhow + tracing-subscriber + indicatif); implies `server` |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! [`PdfiumEngine`] needs the pdfium shared library at runtime. Point
//! `PDFIUM_LIB_PATH` at it, place it next to the executable, or install it
//! system-wide.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pages;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ExportFormat, ExportOptions};
pub use convert::{convert, convert_pages, convert_sync, convert_to_file, inspect};
pub use engine::{DocumentBytes, EngineConfig, EngineError, PdfiumEngine, RenderEngine};
pub use error::{PageError, PageSpecError, Pdf2ImgError};
pub use output::{Archive, ConversionOutput, ConversionStats, DocumentInfo, PageResult};
pub use pages::{parse_page_spec, PageSet};
pub use pipeline::archive::{build_archive, ArchiveBuilder};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, render_stream, PageStream};
