//! CLI binary for edgequake-docstruct.
//!
//! A thin shim over the library crate: each subcommand loads its input,
//! maps flags onto the library's option types, and prints the result as JSON
//! or as a short human-readable report.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_docstruct::{
    render_toc_text, AbortSignal, Document, PageRangeConfig, PageRangeParser,
    PageRangeProgressCallback, TocEntry, TocFinder, TocFinderOptions, TocValidationOptions,
    TocValidator,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
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

/// Progress bar over physical pages; groups finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PageRangeProgressCallback for CliProgressCallback {
    fn on_parse_start(&self, total_pages: usize, group_count: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Reading");
        self.bar.println(format!(
            "{} {} pages in {} size group(s)",
            bold("◆"),
            total_pages,
            group_count
        ));
    }

    fn on_group_start(&self, first_page: u32, last_page: u32) {
        self.bar.set_message(format!("pages {first_page}-{last_page}"));
    }

    fn on_group_complete(&self, first_page: u32, last_page: u32, vision_calls: u32) {
        self.bar.println(format!(
            "  {} Pages {:>4}-{:<4} {}",
            green("✓"),
            first_page,
            last_page,
            dim(&format!("{vision_calls} call(s)"))
        ));
        self.bar.inc(u64::from(last_page - first_page + 1));
    }

    fn on_group_error(&self, first_page: u32, last_page: u32, error: &str) {
        let msg: String = error.chars().take(80).collect();
        self.bar.println(format!(
            "  {} Pages {:>4}-{:<4} {}",
            red("✗"),
            first_page,
            last_page,
            red(&msg)
        ));
    }

    fn on_parse_complete(&self, total_pages: usize, failed_pages: usize) {
        self.bar.finish_and_clear();
        if failed_pages == 0 {
            eprintln!("{} {} pages mapped", green("✔"), bold(&total_pages.to_string()));
        } else {
            eprintln!(
                "{} {} pages mapped ({} unresolved)",
                bold("⚠"),
                total_pages,
                red(&failed_pages.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Locate the table of contents
  docstruct toc report.json

  # Print the TOC region as plain text
  docstruct toc --text report.json

  # Check an extracted TOC tree against a 240-page document
  docstruct validate --total-pages 240 entries.json

  # Map physical pages to printed page numbers
  docstruct pages --model gpt-4.1-mini --fallback-model gpt-4.1 report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter
"#;

#[derive(Parser, Debug)]
#[command(
    name = "docstruct",
    version,
    about = "Locate tables of contents, validate TOC trees, and map printed page numbers",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print results as JSON.
    #[arg(long, global = true, env = "DOCSTRUCT_JSON")]
    json: bool,

    /// Debug-level logs.
    #[arg(short, long, global = true, env = "DOCSTRUCT_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "DOCSTRUCT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Locate the table of contents in a document JSON file.
    Toc(TocArgs),
    /// Validate an extracted TOC entry tree (JSON array of entries).
    Validate(ValidateArgs),
    /// Map each physical page to its printed page range (calls a vision LLM).
    Pages(PagesArgs),
}

#[derive(Args, Debug)]
struct TocArgs {
    document: PathBuf,

    #[arg(long, env = "DOCSTRUCT_MAX_SEARCH_PAGES", default_value_t = 10)]
    max_search_pages: u32,

    /// Extra TOC heading keyword (repeatable).
    #[arg(long = "keyword")]
    keywords: Vec<String>,

    /// Print the flattened TOC text instead of the location.
    #[arg(long)]
    text: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    entries: PathBuf,

    #[arg(long)]
    total_pages: Option<u32>,

    #[arg(long, default_value_t = 200)]
    max_title_length: usize,
}

#[derive(Args, Debug)]
struct PagesArgs {
    document: PathBuf,

    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    #[arg(long, env = "DOCSTRUCT_FALLBACK_MODEL")]
    fallback_model: Option<String>,

    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    #[arg(short, long, env = "DOCSTRUCT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    #[arg(long, env = "DOCSTRUCT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    #[arg(long, env = "DOCSTRUCT_PATTERN_RETRIES", default_value_t = 3)]
    pattern_retries: u32,

    #[arg(long, env = "DOCSTRUCT_SAMPLE_SIZE", default_value_t = 3)]
    sample_size: usize,

    #[arg(long, env = "DOCSTRUCT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    #[arg(long, env = "DOCSTRUCT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    #[arg(long, env = "DOCSTRUCT_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let progress_active = matches!(&cli.command, Command::Pages(a) if !a.no_progress)
        && !cli.quiet
        && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || progress_active {
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

    match cli.command {
        Command::Toc(ref args) => run_toc(args, cli.json),
        Command::Validate(ref args) => run_validate(args, cli.json),
        Command::Pages(ref args) => run_pages(args, cli.json, progress_active).await,
    }
}

fn load_document(path: &Path) -> Result<Document> {
    Document::from_path(path).with_context(|| format!("Failed to load document {}", path.display()))
}

fn run_toc(args: &TocArgs, json: bool) -> Result<()> {
    let doc = load_document(&args.document)?;
    let options = TocFinderOptions::default()
        .with_max_search_pages(args.max_search_pages)
        .with_additional_keywords(args.keywords.iter().cloned());
    let location = TocFinder::new(options)
        .find(&doc)
        .context("TOC search failed")?;

    if args.text {
        println!("{}", render_toc_text(&doc, &location));
    } else if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&location).context("Failed to serialize TOC location")?
        );
    } else {
        println!("Pages:       {}-{}", location.start_page, location.end_page);
        println!("Containers:  {}", location.item_refs.len());
        for r in &location.item_refs {
            println!("  {}", dim(r));
        }
    }
    Ok(())
}

fn run_validate(args: &ValidateArgs, json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&args.entries)
        .with_context(|| format!("Failed to read {}", args.entries.display()))?;
    let entries: Vec<TocEntry> =
        serde_json::from_str(&raw).context("Entries must be a JSON array of TOC entries")?;

    let mut options = TocValidationOptions::default().with_max_title_length(args.max_title_length);
    if let Some(total) = args.total_pages {
        options = options.with_total_pages(total);
    }
    let report = TocValidator::new(options).validate(&entries);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else if report.valid {
        eprintln!("{} TOC is structurally valid", green("✔"));
    } else {
        for issue in &report.issues {
            println!(
                "{} [{}] {} {} {}",
                red("✗"),
                issue.code,
                issue.message,
                dim(&issue.path),
                dim(&issue.entry.to_string())
            );
        }
    }

    if !report.valid {
        bail!("TOC validation failed with {} error(s)", report.error_count);
    }
    Ok(())
}

async fn run_pages(args: &PagesArgs, json: bool, show_progress: bool) -> Result<()> {
    let doc = load_document(&args.document)?;

    let abort = AbortSignal::new();
    let on_ctrl_c = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.abort();
        }
    });

    let mut builder = PageRangeConfig::builder()
        .concurrency(args.concurrency)
        .max_retries(args.max_retries)
        .pattern_retries(args.pattern_retries)
        .sample_size(args.sample_size)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout)
        .abort_signal(abort);
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref model) = args.fallback_model {
        builder = builder.fallback_model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }
    let config = builder.build().context("Invalid configuration")?;

    let parser = PageRangeParser::from_config(config).context("Failed to set up the vision model")?;
    let output = parser.parse(&doc).await.context("Page range parsing failed")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize page ranges")?
        );
        return Ok(());
    }

    println!("{:>8}  {}", bold("Physical"), bold("Printed"));
    for (page, range) in &output.page_range_map {
        let printed = if range.is_failed() {
            red("?")
        } else if range.is_double_sided() {
            format!("{}-{}", range.start_page_no, range.end_page_no)
        } else {
            range.start_page_no.to_string()
        };
        println!("{page:>8}  {printed}");
    }
    eprintln!(
        "{}",
        dim(&format!(
            "tokens: {} in / {} out over {} call(s)",
            output.total_input_tokens(),
            output.total_output_tokens(),
            output.usage.len()
        ))
    );
    Ok(())
}
