//! CLI binary for deck2slides.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints the slide list as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use deck2slides::{
    probe_tools, ConversionConfig, ConversionProgressCallback, FailureArtifacts, ProgressCallback,
    SlideConverter, StrategyProbe, TokioProcessRunner,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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

/// Spinner while tools run, then a bar while slides are promoted.
struct CliProgressCallback {
    bar: ProgressBar,
    promoted: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Validating deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            promoted: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} slides  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Promoting");
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, presentation_id: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting presentation '{presentation_id}'…"))
        ));
    }

    fn on_office_conversion_start(&self) {
        self.bar.set_prefix("Office");
        self.bar.set_message("converting deck to PDF…");
    }

    fn on_office_conversion_complete(&self, via: &str) {
        self.bar
            .println(format!("  {} PDF created  {}", green("✓"), dim(via)));
    }

    fn on_strategy_start(&self, name: &str) {
        self.bar.set_prefix("Raster");
        self.bar.set_message(format!("trying {name}…"));
    }

    fn on_strategy_failed(&self, name: &str, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {:<12} {}", red("✗"), name, dim(&msg)));
    }

    fn on_strategy_succeeded(&self, name: &str, slide_count: usize) {
        self.bar.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            name,
            dim(&format!("{slide_count} slides"))
        ));
        self.activate_bar(slide_count);
    }

    fn on_slide_promoted(&self, _slide_number: usize, _total: usize, remote: bool) {
        if remote {
            self.promoted.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, slide_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} slides ready  {}",
            green("✔"),
            bold(&slide_count.to_string()),
            dim(&format!("{} uploaded", self.promoted.load(Ordering::SeqCst)))
        );
    }

    fn on_conversion_failed(&self, _error: &str) {
        // anyhow prints the error itself once main returns
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), bold("Conversion failed"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Local mode: slides under ./converted-slides/<id>/slide-NNN.png
  deck2slides lecture.pptx --id 65f0c2a9

  # Custom slides root and DPI
  deck2slides deck.pdf --id demo --root /srv/app/converted-slides --dpi 200

  # Full result (stats included) instead of the slide list
  deck2slides deck.pdf --id demo --json

  # Human-readable listing
  deck2slides deck.pdf --id demo --table

  # Which converters are installed here?
  deck2slides --probe

OUTPUT:
  The slide list is printed to stdout as JSON:
    [{"slideNumber": 1, "imagePath": "/converted-slides/demo/slide-001.png"}, …]
  imagePath is a remote URL when the upload of that slide succeeded.

ENVIRONMENT VARIABLES:
  CLOUDINARY_CLOUD_NAME   Slide store cloud name    ┐ all three set:
  CLOUDINARY_API_KEY      Slide store API key       ├ slides are uploaded
  CLOUDINARY_API_SECRET   Slide store API secret    ┘
  PDFIUM_LIB_PATH         libpdfium file or directory for the in-process renderer
  RUST_LOG                Overrides the log filter (e.g. deck2slides=debug)

TOOLS (tried in this order):
  office   soffice / libreoffice (+ known install paths)
  raster   pdftoppm → gs / ghostscript → mutool → pdfium
"#;

/// Convert slide decks (PPT/PPTX/PDF) into ordered PNG slide images.
#[derive(Parser, Debug)]
#[command(
    name = "deck2slides",
    version,
    about = "Convert slide decks (PPT/PPTX/PDF) into ordered PNG slide images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Slide deck to convert (.ppt, .pptx, .pps, .ppsx, .odp or .pdf).
    #[arg(required_unless_present = "probe")]
    input: Option<PathBuf>,

    /// Presentation id; slides go to <root>/<id>/.
    #[arg(long, env = "DECK2SLIDES_ID", required_unless_present = "probe")]
    id: Option<String>,

    /// Root directory for converted slides.
    #[arg(long, env = "DECK2SLIDES_ROOT", default_value = "converted-slides")]
    root: PathBuf,

    /// URL prefix of locally served slides.
    #[arg(long, env = "DECK2SLIDES_PUBLIC_PREFIX", default_value = "/converted-slides")]
    public_prefix: String,

    /// Rasterisation DPI (72–600).
    #[arg(long, env = "DECK2SLIDES_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Time budget for each external tool, in seconds.
    #[arg(long, env = "DECK2SLIDES_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Number of slide uploads in flight.
    #[arg(long, env = "DECK2SLIDES_UPLOAD_CONCURRENCY", default_value_t = 1)]
    upload_concurrency: usize,

    /// Never upload, even when store credentials are set.
    #[arg(long, env = "DECK2SLIDES_NO_UPLOAD")]
    no_upload: bool,

    /// Keep generated PNGs when every raster tool fails.
    #[arg(long, env = "DECK2SLIDES_KEEP_FAILED_OUTPUT")]
    keep_failed_output: bool,

    /// Print the full result (slides and stats) instead of the slide list.
    #[arg(long, env = "DECK2SLIDES_JSON", conflicts_with = "table")]
    json: bool,

    /// Print a human-readable table instead of JSON.
    #[arg(long)]
    table: bool,

    /// Report which converters are available and exit.
    #[arg(long)]
    probe: bool,

    /// Disable progress display.
    #[arg(long, env = "DECK2SLIDES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECK2SLIDES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECK2SLIDES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress display replaces INFO logs; verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.probe;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Probe mode ───────────────────────────────────────────────────────
    if cli.probe {
        let probe = StrategyProbe::default();
        let converter = SlideConverter::with_runner(config, Arc::new(TokioProcessRunner), probe);
        let tools = probe_tools(&converter, &TokioProcessRunner, probe).await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&tools).context("Failed to serialise probe result")?
            );
        } else {
            for t in &tools {
                let mark = if t.available { green("✓") } else { red("✗") };
                println!("{mark} {:<7} {}", t.stage, t.name);
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    // clap guarantees both are present outside probe mode
    let input = cli.input.clone().context("missing input file")?;
    let id = cli.id.clone().context("missing --id")?;

    let converter = SlideConverter::new(config);
    let result = converter
        .convert(&input, &id)
        .await
        .with_context(|| format!("Conversion of {} failed", input.display()))?;

    if cli.table {
        for slide in &result.slides {
            let origin = if slide.is_remote() { "remote" } else { "local" };
            println!("{:>4}  {:<6}  {}", slide.slide_number, origin, slide.image_path());
        }
    } else {
        let json = if cli.json {
            serde_json::to_string_pretty(&result)
        } else {
            serde_json::to_string_pretty(&result.records())
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet && !show_progress {
        eprintln!(
            "Converted {} slides via {} in {}ms ({} uploaded)",
            result.stats.slide_count,
            result.stats.raster_strategy,
            result.stats.total_duration_ms,
            result.stats.uploaded
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .converted_slides_root(&cli.root)
        .public_path_prefix(cli.public_prefix.clone())
        .dpi(cli.dpi)
        .process_timeout_secs(cli.timeout)
        .upload_concurrency(cli.upload_concurrency)
        .failure_artifacts(if cli.keep_failed_output {
            FailureArtifacts::Keep
        } else {
            FailureArtifacts::Remove
        });

    if !cli.no_upload {
        builder = builder.cloud_from_env();
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
