//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render (× N pages, concurrent) ──▶ archive
//! (path/URL)  (engine on blocking pool)        (ZIP, ascending pages)
//! ```
//!
//! 1. [`input`]   — load the user-supplied path or URL into memory and check
//!    the PDF signature
//! 2. [`render`]  — one task per page; engine errors, panics and timeouts
//!    become per-page [`crate::error::PageError`]s
//! 3. [`archive`] — deterministic ZIP writer, one entry per page

pub mod archive;
pub mod input;
pub mod render;
