//! Configuration types for PDF-to-image conversion.
//!
//! Per-request export settings live in [`ExportOptions`]; everything that
//! controls how the pipeline runs (parallelism, timeouts, progress events)
//! lives in [`ConversionConfig`], built via its [`ConversionConfigBuilder`].
//!
//! Export options come straight from untrusted form fields, so they never
//! fail: an unknown format, a missing resolution or a silly quality value
//! falls back to a documented default and the substitution is logged.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Image encoding written for every page of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless; quality is ignored. (default)
    #[default]
    Png,
    /// Lossy; honours [`ExportOptions::quality`]. Alpha is dropped.
    Jpeg,
    /// Lossless; LZW-compressed when [`ExportOptions::quality`] is positive.
    Tiff,
}

impl ExportFormat {
    /// Look up a format by its user-facing name (`png`, `jpg`/`jpeg`, `tiff`/`tif`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "tiff" | "tif" => Some(ExportFormat::Tiff),
            _ => None,
        }
    }

    /// File extension used for archive entries.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Tiff => "tiff",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Tiff => "image/tiff",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How each page is rasterised and encoded.
///
/// Resolution and quality are handed to the render engine unmodified; the
/// format decides both the encoder and the archive entry extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Rendering resolution in DPI. Range: 1–300. Default: 300.
    pub resolution: u32,
    /// Output encoding. Default: PNG.
    pub format: ExportFormat,
    /// Encoder quality, used by JPEG and TIFF. Default: 100.
    ///
    /// Kept as given; the encoder clamps JPEG quality to 1–100 and switches
    /// TIFF compression on for any positive value.
    pub quality: u32,
}

impl ExportOptions {
    pub const DEFAULT_RESOLUTION: u32 = 300;
    pub const MAX_RESOLUTION: u32 = 300;
    pub const DEFAULT_QUALITY: u32 = 100;

    /// Build options from raw request parameters, substituting defaults for
    /// anything missing, unparsable or out of range.
    pub fn from_params(
        resolution: Option<&str>,
        format: Option<&str>,
        quality: Option<&str>,
    ) -> Self {
        let resolution = resolution
            .and_then(|r| r.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let quality = quality
            .and_then(|q| q.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let format = match format.map(str::trim).filter(|f| !f.is_empty()) {
            Some(name) => ExportFormat::from_name(name).unwrap_or_else(|| {
                info!("export format '{}' is not supported, using default png", name);
                ExportFormat::default()
            }),
            None => ExportFormat::default(),
        };

        Self::default()
            .with_resolution(resolution)
            .with_format(format)
            .with_quality(quality)
    }

    /// Set the resolution; values outside 1–300 fall back to 300.
    pub fn with_resolution(mut self, dpi: i64) -> Self {
        self.resolution = match u32::try_from(dpi) {
            Ok(dpi) if (1..=Self::MAX_RESOLUTION).contains(&dpi) => dpi,
            _ => {
                info!(
                    "resolution {} is not set or outside 1-{}, using default {}",
                    dpi,
                    Self::MAX_RESOLUTION,
                    Self::DEFAULT_RESOLUTION
                );
                Self::DEFAULT_RESOLUTION
            }
        };
        self
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the quality; non-positive values fall back to 100.
    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = if quality <= 0 {
            Self::DEFAULT_QUALITY
        } else {
            u32::try_from(quality).unwrap_or(u32::MAX)
        };
        self
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            format: ExportFormat::default(),
            quality: Self::DEFAULT_QUALITY,
        }
    }
}

/// Configuration for one PDF-to-image conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{ConversionConfig, ExportFormat};
///
/// let config = ConversionConfig::builder()
///     .format(ExportFormat::Jpeg)
///     .resolution(150)
///     .quality(85)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Resolution, format and quality applied to every page.
    pub export: ExportOptions,

    /// Maximum number of pages rendered at the same time. Default: number of
    /// CPUs reported by the OS.
    ///
    /// Rendering is CPU- and memory-bound; one 300 DPI RGBA page of a Letter
    /// document is ~35 MB before encoding, so an unbounded fan-out over a
    /// 500-page selection would exhaust memory long before it saved time.
    pub concurrency: usize,

    /// Per-page render timeout in seconds. Default: 60. Zero means the
    /// default.
    ///
    /// The clock starts when the engine admits the page, not while it waits
    /// for an engine slot. A page that exceeds it is reported as a [`crate::error::PageError::Timeout`]
    /// and left out of the archive; the rest of the request carries on.
    pub page_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

/// Per-page render timeout used when none (or zero) is configured.
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 60;

/// Number of CPUs, or 4 when the OS will not say.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            export: ExportOptions::default(),
            concurrency: default_concurrency(),
            page_timeout_secs: DEFAULT_PAGE_TIMEOUT_SECS,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("export", &self.export)
            .field("concurrency", &self.concurrency)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective per-page timeout.
    pub fn page_timeout(&self) -> Duration {
        match self.page_timeout_secs {
            0 => Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn export(mut self, export: ExportOptions) -> Self {
        self.config.export = export;
        self
    }

    pub fn resolution(mut self, dpi: i64) -> Self {
        self.config.export = self.config.export.with_resolution(dpi);
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.config.export = self.config.export.with_format(format);
        self
    }

    pub fn quality(mut self, quality: i64) -> Self {
        self.config.export = self.config.export.with_quality(quality);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.page_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Page timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
