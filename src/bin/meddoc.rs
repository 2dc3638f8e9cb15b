//! CLI binary for meddoc-analyzer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzerConfig`, reads the input files, and prints the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use meddoc_analyzer::{
    analyze, AnalysisOutcome, AnalysisProgressCallback, AnalyzerConfig, Clients, UploadedFile,
};
use std::path::PathBuf;
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

/// Terminal progress: a live bar plus one log line per finished file.
/// Works correctly when files complete out of order.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgress {
    fn on_request_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
    }

    fn on_file_start(&self, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_file_extracted(&self, filename: &str, text_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            filename,
            dim(&format!("{text_len} chars"))
        ));
        self.bar.inc(1);
    }

    fn on_file_failed(&self, filename: &str, error: &str) {
        let msg = if error.chars().count() > 80 {
            let truncated: String = error.chars().take(79).collect();
            format!("{truncated}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), filename, red(&msg)));
        self.bar.inc(1);
    }

    fn on_analysis_start(&self, readable_files: usize) {
        self.bar.set_prefix("Analyzing");
        self.bar
            .set_message(format!("{readable_files} readable files"));
    }

    fn on_request_complete(&self, _total: usize, _readable: usize) {
        self.bar.finish_and_clear();
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Analyze medical documents into structured findings.
#[derive(Parser, Debug)]
#[command(name = "meddoc", version, about)]
struct Cli {
    /// Input files (PDF, PNG, JPG); up to the per-request limit.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// LLM model identifier.
    #[arg(long, env = "MEDDOC_MODEL")]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible LLM endpoint.
    #[arg(long, env = "MEDDOC_LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// OCR provider endpoint URL.
    #[arg(long, env = "MEDDOC_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    /// Concurrent OCR extractions.
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Transient-failure retries per provider call.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-provider-call timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Write the JSON report here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suppress the progress bar.
    #[arg(short, long)]
    quiet: bool,
}

fn media_type_for(path: &PathBuf) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = AnalyzerConfig::builder()
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .request_timeout_secs(cli.timeout);
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(url) = &cli.llm_base_url {
        builder = builder.llm_base_url(url);
    }
    if let Some(url) = &cli.ocr_endpoint {
        builder = builder.ocr_endpoint(url);
    }
    if !cli.quiet {
        builder = builder.progress_callback(CliProgress::new());
    }
    let config = builder.build().context("invalid configuration")?;

    let clients = Clients::from_env(&config).context("provider setup failed")?;

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read input file {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile::new(filename, media_type_for(path), bytes));
    }

    let report = analyze(files, &config, &clients)
        .await
        .context("analysis failed")?;

    // Human summary on stderr, machine-readable report on stdout/file.
    for file in &report.files {
        match &file.error {
            None => eprintln!("{} {}", green("✔"), file.filename),
            Some(e) => eprintln!("{} {}  {}", red("✘"), file.filename, dim(&e.to_string())),
        }
    }
    match &report.analysis {
        AnalysisOutcome::Complete { findings } => {
            eprintln!(
                "{} findings extracted from {} file(s)",
                green("✔"),
                findings.source_files.len()
            );
        }
        AnalysisOutcome::ParseFailed { detail, .. } => {
            eprintln!(
                "{} model output failed validation: {}",
                red("✘"),
                bold(detail)
            );
        }
        AnalysisOutcome::Skipped => {
            eprintln!("{} no file could be read; analysis skipped", red("✘"));
        }
    }

    let json = serde_json::to_string_pretty(&report).context("report serialization")?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
            eprintln!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    // Non-zero exit when nothing useful was produced.
    if matches!(report.analysis, AnalysisOutcome::Skipped) {
        std::process::exit(2);
    }

    Ok(())
}
