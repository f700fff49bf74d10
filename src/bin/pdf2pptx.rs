//! CLI binary for edgequake-pdf2pptx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2pptx::{
    convert_to_file, default_output_path, inspect, ConversionConfig, ConversionProgressCallback,
    ProgressCallback,
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
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for decomposition, reused for notes.
///
/// Pages of a batch finish in any order, so the bar position only moves on
/// `on_batch_complete`; per-page lines are printed as they arrive.
struct CliProgressCallback {
    bar: ProgressBar,
    notes_enabled: bool,
    notes_done: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic(notes_enabled: bool) -> Arc<Self> {
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
            notes_enabled,
            notes_done: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages, "Decomposing");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Decomposing {total_pages} pages…"))
        ));
    }

    fn on_page_decomposed(&self, page_num: usize, text_items: usize, image_items: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}  {}",
            green("✓"),
            page_num,
            dim(&format!("{text_items:>4} text boxes")),
            dim(&format!("{image_items:>3} pictures")),
        ));
    }

    fn on_batch_complete(&self, pages_done: usize, total_pages: usize) {
        self.bar.set_position(pages_done as u64);
        if pages_done == total_pages && self.notes_enabled {
            self.activate_bar(total_pages, "Notes");
        }
    }

    fn on_notes_complete(&self, page_num: usize, _total_pages: usize, notes_len: usize) {
        let done = self.notes_done.fetch_add(1, Ordering::SeqCst) + 1;
        let mark = if notes_len > 0 { green("✓") } else { yellow("–") };
        self.bar.println(format!(
            "  {} Notes {:>3}  {}",
            mark,
            page_num,
            dim(&format!("{notes_len:>5} chars")),
        ));
        self.bar.set_position(done as u64);
    }

    fn on_conversion_complete(&self, _total_pages: usize, slide_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} slides assembled",
            green("✔"),
            bold(&slide_count.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the current directory (slides.pptx)
  pdf2pptx slides.pdf

  # Choose the output file
  pdf2pptx slides.pdf -o deck.pptx

  # Sharper background plates
  pdf2pptx --scale 3 --quality 92 poster.pdf

  # Add speaker notes written by a vision LLM
  pdf2pptx --notes --provider openai --model gpt-4.1-nano lecture.pdf

  # Convert from URL
  pdf2pptx https://example.com/talk.pdf -o talk.pptx

  # Inspect PDF metadata (no pdfium or API key needed)
  pdf2pptx --inspect-only slides.pdf

  # JSON stats instead of a summary line
  pdf2pptx --json slides.pdf > stats.json

HOW A SLIDE IS BUILT:
  1. Background  the page rendered with its text removed (JPEG)
  2. Pictures    each raster image of the page, movable (PNG)
  3. Text boxes  each text run, editable, in the chosen font

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (speaker notes)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium for background plates
"#;

/// Convert PDF files and URLs to layered, editable PowerPoint decks.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2pptx",
    version,
    about = "Convert PDF files and URLs to layered, editable PowerPoint decks",
    long_about = "Convert PDF documents (local files or URLs) to PowerPoint decks in which every \
slide stacks a text-free background plate, the page's pictures, and editable text boxes. \
Optionally adds speaker notes generated by a vision LLM (OpenAI, Anthropic, Gemini, Ollama, ...).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the deck to this file instead of `<input stem>.pptx`.
    #[arg(short, long, env = "PDF2PPTX_OUTPUT")]
    output: Option<PathBuf>,

    /// Deck title. Defaults to the input file name.
    #[arg(long, env = "PDF2PPTX_TITLE")]
    title: Option<String>,

    /// Pages decomposed at once; bounds peak memory.
    #[arg(short, long, env = "PDF2PPTX_BATCH_SIZE", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=64))]
    batch_size: u32,

    /// Background plate oversampling relative to 72 DPI (2.0–4.0).
    #[arg(long, env = "PDF2PPTX_SCALE", default_value_t = 2.0)]
    scale: f64,

    /// Background plate JPEG quality (1–100).
    #[arg(long, env = "PDF2PPTX_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Font face for every text box.
    #[arg(long, env = "PDF2PPTX_FONT", default_value = "Meiryo UI")]
    font: String,

    /// Extra text-box width in inches.
    #[arg(long, env = "PDF2PPTX_TEXT_PADDING", default_value_t = 0.1)]
    text_padding: f64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PPTX_PASSWORD")]
    password: Option<String>,

    /// Generate speaker notes with a vision LLM.
    #[arg(long, env = "PDF2PPTX_NOTES")]
    notes: bool,

    /// LLM provider for notes: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID for notes (e.g. gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom notes prompt.
    #[arg(long, env = "PDF2PPTX_NOTES_PROMPT")]
    notes_prompt: Option<PathBuf>,

    /// Retries per page after a rate-limit or overload response.
    #[arg(long, env = "PDF2PPTX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Pause between notes requests in milliseconds.
    #[arg(long, env = "PDF2PPTX_NOTES_PACING_MS", default_value_t = 1000)]
    notes_pacing_ms: u64,

    /// Print conversion stats as JSON.
    #[arg(long, env = "PDF2PPTX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2PPTX_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2PPTX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2PPTX_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2PPTX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            if let Some(g) = meta.first_page {
                println!("Slide size:   {:.2} × {:.2} in", g.width, g.height);
            }
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Encrypted:    {}", meta.is_encrypted);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic(cli.notes);
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    // ── Run conversion ───────────────────────────────────────────────────
    let stats = convert_to_file(&cli.input, &output_path, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} slides  {}ms  →  {}",
            green("✔"),
            stats.total_pages,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        eprintln!(
            "   {} text boxes  /  {} pictures  /  {} skipped{}",
            dim(&stats.text_items.to_string()),
            dim(&stats.image_items.to_string()),
            dim(&stats.skipped_items.to_string()),
            if cli.notes {
                format!("  /  {} with notes", dim(&stats.pages_with_notes.to_string()))
            } else {
                String::new()
            },
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .batch_size(cli.batch_size as usize)
        .background_scale(cli.scale)
        .background_quality(cli.quality)
        .font_face(cli.font.clone())
        .text_width_padding(cli.text_padding)
        .notes(cli.notes)
        .notes_max_retries(cli.max_retries)
        .notes_pacing_ms(cli.notes_pacing_ms)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.notes_provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.notes_model(model.clone());
    }
    if let Some(ref path) = cli.notes_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read notes prompt from {:?}", path))?;
        builder = builder.notes_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
