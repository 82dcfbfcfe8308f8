//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `EngineConfig` / `ServerConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdf2img::pipeline::input::{default_archive_name, resolve_input};
use edgequake_pdf2img::server::{self, AppState, ServerConfig};
use edgequake_pdf2img::{
    convert_to_file, inspect, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    EngineConfig, ExportFormat, PdfiumEngine, ProgressCallback, RenderEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page. Pages complete out of order, so timings are tracked per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_ms(&self, page_num: usize) -> u128 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, image_bytes: usize) {
        let elapsed_ms = self.elapsed_ms(page_num);
        self.bar.println(format!(
            "  {} Page {:>4}  {:<12}  {}",
            green("✓"),
            page_num,
            dim(&format!("{:>7.1} KiB", image_bytes as f64 / 1024.0)),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, _total: usize, error: &str) {
        let elapsed_ms = self.elapsed_ms(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep long pdfium messages on one line.
        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('…');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>4}  {}  {}",
            red("✗"),
            page_num,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages rendered successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as 300 DPI PNG → document.zip
  pdf2img convert document.pdf

  # Pages 1-3 and 7 to the end, JPEG at quality 85, 150 DPI
  pdf2img convert --pages 1-3,7- --format jpg --quality 85 --resolution 150 report.pdf -o out.zip

  # Convert from URL
  pdf2img convert https://arxiv.org/pdf/1706.03762.pdf

  # Page count and metadata
  pdf2img inspect document.pdf --json

  # HTTP service
  pdf2img serve --bind 0.0.0.0:8080
  curl -F 'file[]=@document.pdf' -F pages=1-3 -F export=png \
       http://localhost:8080/convert -o pages.zip

PAGE SELECTION:
  N      single page            A-B   pages A to B inclusive
  A-     page A to the last     -B    first page to B
  -      every page             a,b   union of terms, e.g. 1-3,5,9-

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to the pdfium shared library
  RUST_LOG                Log filter, e.g. edgequake_pdf2img=debug
  PDF2IMG_*               Every flag, e.g. PDF2IMG_RESOLUTION=150
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Render PDF pages to PNG/JPEG/TIFF and bundle them into a ZIP archive",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Errors only; no progress bar or summary.
    #[arg(short, long, global = true, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert selected pages of a PDF file or URL into a ZIP of images.
    Convert(ConvertArgs),
    /// Print page count and metadata.
    Inspect(InspectArgs),
    /// Run the HTTP conversion service.
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF path or http(s) URL.
    input: String,

    /// Output archive. Default: <input stem>.zip in the current directory.
    #[arg(short, long, env = "PDF2IMG_OUTPUT")]
    output: Option<PathBuf>,

    /// Page selection, e.g. "1-3,5,7-".
    #[arg(long, env = "PDF2IMG_PAGES", default_value = "1-")]
    pages: String,

    #[arg(long, env = "PDF2IMG_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Rendering resolution in DPI.
    #[arg(long, env = "PDF2IMG_RESOLUTION", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(1..=300))]
    resolution: u32,

    /// JPEG quality. TIFF output is LZW-compressed for any value.
    #[arg(long, env = "PDF2IMG_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Pages rendered at the same time. Default: number of CPUs.
    #[arg(short, long, env = "PDF2IMG_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-page render timeout in seconds.
    #[arg(long, env = "PDF2IMG_PAGE_TIMEOUT", default_value_t = 60)]
    page_timeout: u64,

    #[arg(long, env = "PDF2IMG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print a JSON report to stdout.
    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    #[arg(long, env = "PDF2IMG_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    input: String,

    #[arg(long, env = "PDF2IMG_JSON")]
    json: bool,

    #[arg(long, env = "PDF2IMG_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "PDF2IMG_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Largest accepted upload in MiB.
    #[arg(long, env = "PDF2IMG_MAX_UPLOAD_MB", default_value_t = 32)]
    max_upload_mb: usize,

    /// Pages rendered at the same time per request. Default: number of CPUs.
    #[arg(short, long, env = "PDF2IMG_CONCURRENCY")]
    concurrency: Option<usize>,

    #[arg(long, env = "PDF2IMG_PAGE_TIMEOUT", default_value_t = 60)]
    page_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    #[value(alias = "jpeg")]
    Jpg,
    #[value(alias = "tif")]
    Tiff,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Jpg => ExportFormat::Jpeg,
            FormatArg::Tiff => ExportFormat::Tiff,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    input: &'a str,
    output: &'a std::path::Path,
    #[serde(flatten)]
    result: &'a ConversionOutput,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters while it is
    // shown, so library logs drop to errors.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── PDF engine ───────────────────────────────────────────────────────
    let engine_config = EngineConfig {
        library_path: cli.pdfium_lib.clone(),
        ..Default::default()
    };
    let engine = tokio::task::block_in_place(|| PdfiumEngine::acquire(engine_config))
        .context("Failed to start the PDF render engine")?;
    let engine: Arc<dyn RenderEngine> = Arc::new(engine);

    match cli.command {
        Command::Convert(ref args) => run_convert(&cli, args, engine, show_progress).await,
        Command::Inspect(ref args) => run_inspect(args, engine).await,
        Command::Serve(ref args) => run_serve(args, engine).await,
    }
}

async fn run_convert(
    cli: &Cli,
    args: &ConvertArgs,
    engine: Arc<dyn RenderEngine>,
    show_progress: bool,
) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .format(args.format.into())
        .resolution(args.resolution as i64)
        .quality(args.quality as i64)
        .page_timeout_secs(args.page_timeout)
        .download_timeout_secs(args.download_timeout);
    if let Some(n) = args.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_archive_name(&args.input)));

    let output = convert_to_file(&args.input, &output_path, &args.pages, &config, engine)
        .await
        .context("Conversion failed")?;

    if args.json {
        let report = Report {
            input: &args.input,
            output: &output_path,
            result: &output,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} pages  {} KiB  {}ms  →  {}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.converted_pages,
            stats.requested_pages,
            stats.archive_bytes / 1024,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if !show_progress {
            for failure in &output.failures {
                eprintln!("   {} {}", red("✗"), failure);
            }
        }
    }

    Ok(())
}

async fn run_inspect(args: &InspectArgs, engine: Arc<dyn RenderEngine>) -> Result<()> {
    let loaded = resolve_input(&args.input, args.download_timeout)
        .await
        .context("Failed to read input")?;
    let info = inspect(loaded.bytes, engine)
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&info).context("Failed to serialise metadata")?
        );
    } else {
        println!("File:         {}", args.input);
        if let Some(ref t) = info.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = info.author {
            println!("Author:       {}", a);
        }
        println!("Pages:        {}", info.page_count);
        println!("Size:         {} bytes", info.size_bytes);
        if let Some(ref v) = info.pdf_version {
            println!("PDF Version:  {}", v);
        }
        if let Some(ref p) = info.producer {
            println!("Producer:     {}", dim(p));
        }
    }
    Ok(())
}

async fn run_serve(args: &ServeArgs, engine: Arc<dyn RenderEngine>) -> Result<()> {
    let mut builder = ConversionConfig::builder().page_timeout_secs(args.page_timeout);
    if let Some(n) = args.concurrency {
        builder = builder.concurrency(n);
    }
    let config = builder.build().context("Invalid configuration")?;

    let server_config = ServerConfig {
        bind: args.bind,
        max_upload_bytes: args.max_upload_mb.max(1) * 1024 * 1024,
    };
    server::serve(server_config, AppState::new(engine, config))
        .await
        .context("HTTP server failed")
}
