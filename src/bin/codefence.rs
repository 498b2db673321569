//! CLI binary for codefence.
//!
//! A thin shim over the library crate that reads converted text files, maps
//! CLI flags to `PipelineConfig` and writes or prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use codefence::{
    collect_inputs, format_files, format_files_to_dir, BatchOutput, BatchStats, DocumentStatus,
    FormatProgressCallback, FormattingPolicy, PipelineConfig, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const MIB: u64 = 1024 * 1024;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per document.
/// Documents complete out of order, so timings are keyed by source.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Formatting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, source: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(source))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl FormatProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Formatting {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, source: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(source.to_string(), Instant::now());
        }
        self.bar.set_message(source.to_string());
    }

    fn on_document_complete(&self, source: &str, status: DocumentStatus, code_blocks: usize) {
        let secs = self.elapsed_secs(source);
        let mark = if status == DocumentStatus::Success {
            green("✓")
        } else {
            yellow("○")
        };
        self.bar.println(format!(
            "  {} {:<40}  {:<16}  {}",
            mark,
            source,
            dim(&format!("{code_blocks:>4} code blocks")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, source: &str, error: &str) {
        let secs = self.elapsed_secs(source);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:<40}  {}  {}",
            red("✗"),
            source,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        let failed = total_documents.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents formatted successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents formatted  ({} not formatted)",
                if failed == total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Format one converted document (stdout)
  codefence guide.txt

  # Format a directory of converted documents into another directory
  codefence converted/ -o formatted/

  # Recognise more languages
  codefence --languages python,go,bash,yaml,json runbook.md -o out/

  # Rebuild indentation instead of keeping it
  codefence --normalize-indentation guide.txt

  # Only fence code, never label it
  codefence --no-detect guide.txt

  # Machine-readable batch report
  codefence --json converted/ -o formatted/ > report.json

SUPPORTED LANGUAGES:
  Tag          Aliases                  Indent unit
  ──────────   ──────────────────────   ───────────
  python       py, python3              4
  go           golang                   4
  rust         rs                       4
  javascript   js, node, jsx, mjs       2
  bash         sh, shell, zsh, console  2
  json                                  2
  yaml         yml                      2

  Code whose language is unclear, or not in --languages, is still fenced
  but left unlabeled.

LIMITS:
  --max-file-size-mb   documents above this are skipped, never processed
  --timeout            a document taking longer is abandoned; others go on
  --memory-budget-mb   total text of the documents being formatted at once
  --max-concurrent     documents formatted at the same time

  A run that formats some documents and skips others still exits 0; the
  summary and --json report say which documents failed and why.

ENVIRONMENT VARIABLES:
  RUST_LOG                   Override the log filter (e.g. codefence=debug)
  Every option can also be set through the PDF_* variable shown in --help.
"#;

/// Detect, label and fence source code in PDF-converted text.
#[derive(Parser, Debug)]
#[command(
    name = "codefence",
    version,
    about = "Detect, label and fence source code in PDF-converted text",
    long_about = "Scan text converted from PDF documents, find the runs that are source code \
rather than prose, label each with its language when the evidence is clear, and wrap it in a \
Markdown code fence. Prose is never rewritten, and meaningful indentation is preserved.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Text or Markdown files, or directories of them (*.md, *.markdown, *.txt).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write formatted files (<stem>.md) to this directory instead of stdout.
    #[arg(short, long, env = "PDF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Comma-separated languages to recognise.
    #[arg(
        short,
        long,
        env = "PDF_SUPPORTED_LANGUAGES",
        value_delimiter = ',',
        default_value = "json,yaml,bash"
    )]
    languages: Vec<String>,

    /// Keep leading whitespace of code exactly as extracted.
    #[arg(long, env = "PDF_PRESERVE_INDENTATION", default_value_t = true,
          action = clap::ArgAction::Set)]
    preserve_indentation: bool,

    /// Rebuild indentation from nesting depth (overrides --preserve-indentation).
    #[arg(long, env = "PDF_NORMALIZE_INDENTATION")]
    normalize_indentation: bool,

    /// Keep trailing whitespace and blank-line runs in preserved code.
    #[arg(long, env = "PDF_NO_MIN_CLEANUP")]
    no_min_cleanup: bool,

    /// Fence code without detecting its language.
    #[arg(long, env = "PDF_NO_DETECT")]
    no_detect: bool,

    /// Per-document timeout in seconds.
    #[arg(long, env = "PDF_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Skip documents larger than this many MiB.
    #[arg(long, env = "PDF_MAX_FILE_SIZE_MB", default_value_t = 100,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_file_size_mb: u64,

    /// Documents formatted at the same time.
    #[arg(short = 'c', long, env = "PDF_MAX_CONCURRENT", default_value_t = 4)]
    max_concurrent: usize,

    /// Total MiB of text across documents being formatted at once
    /// (default: 4 × --max-file-size-mb).
    #[arg(long, env = "PDF_MEMORY_BUDGET_MB")]
    memory_budget_mb: Option<u64>,

    /// Prepend YAML front matter with document metadata.
    #[arg(long, env = "PDF_INCLUDE_METADATA")]
    metadata: bool,

    /// Print the batch report as JSON instead of formatted text.
    #[arg(long, env = "PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.output_dir.is_some();
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

    // ── Collect inputs ───────────────────────────────────────────────────
    let files = collect_inputs(&cli.inputs).context("Failed to collect inputs")?;
    if files.is_empty() {
        anyhow::bail!("No input documents found (looked for *.md, *.markdown, *.txt)");
    }
    if cli.output_dir.is_none() && !cli.json && files.len() > 1 {
        anyhow::bail!(
            "{} input documents found; use --output-dir to write them, or --json",
            files.len()
        );
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn FormatProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run formatting ───────────────────────────────────────────────────
    let mut output = if let Some(ref dir) = cli.output_dir {
        format_files_to_dir(files, dir, &config)
            .await
            .context("Formatting failed")?
    } else {
        format_files(files, &config)
            .await
            .context("Formatting failed")?
    };
    output.sort_by_source();

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output_dir.is_none() {
        write_stdout(&output)?;
    } else if !cli.quiet {
        print_written(&output);
    }

    if !cli.quiet && !show_progress {
        print_summary(&output.stats);
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let policy = FormattingPolicy::new(&cli.languages)
        .context("Invalid --languages")?
        .with_preserve_indentation(cli.preserve_indentation && !cli.normalize_indentation)
        .with_minimal_cleanup(!cli.no_min_cleanup)
        .with_detect_languages(!cli.no_detect);

    let mut builder = PipelineConfig::builder()
        .policy(policy)
        .timeout_secs(cli.timeout)
        .max_document_bytes(cli.max_file_size_mb.saturating_mul(MIB))
        .max_concurrent_documents(cli.max_concurrent)
        .include_metadata(cli.metadata);

    if let Some(mb) = cli.memory_budget_mb {
        builder = builder.memory_budget_bytes(mb.saturating_mul(MIB));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Single-input mode: the formatted text on stdout, any failure on stderr.
fn write_stdout(output: &BatchOutput) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for outcome in &output.documents {
        match (&outcome.output, &outcome.error) {
            (Some(formatted), _) => handle
                .write_all(formatted.text.as_bytes())
                .context("Failed to write to stdout")?,
            (None, Some(error)) => eprintln!("{} {}: {}", red("✗"), outcome.source, error),
            (None, None) => eprintln!("{} {}: {}", red("✗"), outcome.source, outcome.status),
        }
    }
    Ok(())
}

fn print_written(output: &BatchOutput) {
    for outcome in &output.documents {
        match (&outcome.output_path, &outcome.error) {
            (Some(path), _) => eprintln!(
                "  {} {}  →  {}",
                green("✓"),
                outcome.source,
                bold(&path.display().to_string())
            ),
            (None, Some(error)) => eprintln!("  {} {}  {}", red("✗"), outcome.source, dim(&error.to_string())),
            (None, None) => eprintln!("  {} {}  {}", red("✗"), outcome.source, outcome.status),
        }
    }
}

fn print_summary(stats: &BatchStats) {
    eprintln!(
        "{}  {}/{} documents formatted in {}ms",
        if stats.succeeded == stats.total {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.succeeded,
        stats.total,
        stats.total_duration_ms
    );
    if stats.skipped_too_large + stats.timed_out + stats.failed > 0 {
        eprintln!(
            "   {} too large  /  {} timed out  /  {} failed",
            dim(&stats.skipped_too_large.to_string()),
            dim(&stats.timed_out.to_string()),
            dim(&stats.failed.to_string()),
        );
    }
}
