//! CLI binary for receipt-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` / `RasterConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use receipt_extract::pipeline::input::resolve_input;
use receipt_extract::{
    extract_all, rasterize, ExtractionConfig, ExtractionProgressCallback, FrameEncoding, Outcome,
    PdfiumLoader, ProcessedReceipt, ProgressCallback, RasterConfig, ReceiptBatch, ReceiptError,
};
use std::io;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the batch, one log line per document. Documents complete in
/// any order when `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    repaired: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            repaired: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_document_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, name: &str, receipt_count: usize, outcome: Outcome) {
        if outcome == Outcome::Repaired {
            self.repaired.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            green("✓"),
            name,
            dim(&format!("{receipt_count} receipt(s)")),
            dim(&format!("{outcome:?}").to_lowercase()),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, name: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} {:<40}  {}", red("✗"), name, red(first_line)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success: usize) {
        self.bar.finish_and_clear();
        let repaired = self.repaired.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} documents extracted  ({} repaired)",
            if success == total { green("✔") } else { red("✘") },
            bold(&success.to_string()),
            total,
            repaired,
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract receipts from a PDF (JSON on stdout)
  receipts extract walmart.pdf

  # Several documents at once, as a table
  receipts extract --table --concurrency 8 scans/*.jpg

  # Use a specific provider and model
  receipts extract --provider anthropic --model claude-sonnet-4-20250514 receipt.png

  # Render the first two pages of a PDF as PNG data URIs
  receipts rasterize --max-pages 2 statement.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (PDF inputs and `rasterize`)
"#;

/// Extract validated receipt records from PDFs and images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "receipts",
    version,
    about = "Extract validated receipt records from PDFs and images using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RECEIPTS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RECEIPTS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract receipts from one or more documents.
    Extract(ExtractArgs),
    /// Render the first pages of a PDF to image frames.
    Rasterize(RasterArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local file paths or HTTP/HTTPS URLs (PDF, PNG, JPEG, GIF, WEBP).
    #[arg(required = true)]
    inputs: Vec<String>,

    /// LLM model ID (e.g. gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "RECEIPTS_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per document.
    #[arg(long, env = "RECEIPTS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-document extraction timeout in seconds.
    #[arg(long, env = "RECEIPTS_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RECEIPTS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Documents extracted concurrently.
    #[arg(short, long, env = "RECEIPTS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// PDF pages rendered and sent to the model per document.
    #[arg(long, env = "RECEIPTS_MAX_PDF_PAGES", default_value_t = 4)]
    max_pdf_pages: usize,

    /// Print a compact table instead of JSON.
    #[arg(long)]
    table: bool,

    /// Disable progress bar.
    #[arg(long, env = "RECEIPTS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct RasterArgs {
    /// Local PDF path or HTTP/HTTPS URL.
    input: String,

    /// Upper bound on pages rendered.
    #[arg(long, env = "RECEIPTS_MAX_PAGES", default_value_t = 1)]
    max_pages: usize,

    /// Viewport magnification.
    #[arg(long, env = "RECEIPTS_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Emit the source document bytes for every frame instead of a PNG.
    #[arg(long)]
    passthrough: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "RECEIPTS_PDF_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "RECEIPTS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let ok = match cli.command {
        Command::Extract(ref args) => run_extract(args, cli.quiet).await?,
        Command::Rasterize(ref args) => run_rasterize(args).await?,
    };
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns `false` when any document failed.
async fn run_extract(args: &ExtractArgs, quiet: bool) -> Result<bool> {
    let show_progress = !quiet && !args.no_progress && args.inputs.len() > 1;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(args, progress)?;
    let results = extract_all(args.inputs.clone(), &config)
        .await
        .context("Extraction failed")?;

    let mut receipts: Vec<ProcessedReceipt> = Vec::new();
    let mut failures: Vec<(String, ReceiptError)> = Vec::new();
    for doc in results {
        match doc.result {
            Ok(output) => receipts.extend(output.receipts),
            Err(e) => failures.push((doc.input, e)),
        }
    }

    // A single failed document answers with its error body, like the route.
    if receipts.is_empty() && failures.len() == 1 {
        let (_, err) = &failures[0];
        println!("{}", serde_json::to_string_pretty(&err.to_body())?);
        return Ok(false);
    }

    for (input, err) in &failures {
        eprintln!(
            "{} {}: {} {}",
            red("✗"),
            input,
            err.status_code(),
            serde_json::to_string(&err.to_body())?
        );
    }

    if args.table {
        print_table(&receipts);
    } else {
        let batch = ReceiptBatch { receipts };
        println!(
            "{}",
            serde_json::to_string_pretty(&batch).context("Failed to serialise receipts")?
        );
    }

    Ok(failures.is_empty())
}

async fn run_rasterize(args: &RasterArgs) -> Result<bool> {
    let encoding = if args.passthrough {
        FrameEncoding::SourcePassthrough
    } else {
        FrameEncoding::Png
    };
    let config = RasterConfig::builder()
        .max_pages(args.max_pages)
        .scale(args.scale)
        .encoding(encoding)
        .build()
        .context("Invalid configuration")?;

    let document = resolve_input(&args.input, args.download_timeout)
        .await
        .with_context(|| format!("Failed to read {}", args.input))?;
    if !document.is_pdf() {
        anyhow::bail!("{} is {}, not a PDF", args.input, document.mime_type);
    }

    let mut loader = tokio::task::spawn_blocking(PdfiumLoader::new)
        .await
        .context("pdfium binding task panicked")??;
    if let Some(ref pw) = args.password {
        loader = loader.with_password(pw.clone());
    }

    match rasterize(Arc::new(loader), document.bytes, document.mime_type, &config).await {
        Ok(frames) => {
            println!("{}", serde_json::to_string_pretty(&frames)?);
            Ok(true)
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            Ok(false)
        }
    }
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(args: &ExtractArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .timeout_secs(args.timeout)
        .download_timeout_secs(args.download_timeout)
        .concurrency(args.concurrency)
        .max_pdf_pages(args.max_pdf_pages);

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_table(receipts: &[ProcessedReceipt]) {
    println!(
        "{}",
        bold(&format!(
            "{:<10}  {:<28}  {:<14}  {:>10}  {:>8}  {:<4}  {}",
            "DATE", "VENDOR", "CATEGORY", "AMOUNT", "TAX", "CUR", "PAYMENT"
        ))
    );
    for r in receipts {
        let vendor: String = r.vendor.chars().take(28).collect();
        println!(
            "{:<10}  {:<28}  {:<14}  {:>10.2}  {:>8.2}  {:<4}  {}",
            r.date.to_string(),
            vendor,
            r.category.as_str(),
            r.amount,
            r.tax_amount,
            r.currency,
            r.payment_method.as_str(),
        );
    }
    eprintln!("{}", dim(&format!("{} receipt(s)", receipts.len())));
}
