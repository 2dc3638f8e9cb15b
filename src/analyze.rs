//! Request orchestration: the one place where partial-failure policy lives.
//!
//! The policy is "best effort across files, single authoritative analysis of
//! whatever was successfully read": one file's unsupported format, corrupt
//! bytes, or exhausted OCR retries never aborts its siblings, but a
//! credential or quota rejection from either provider aborts the whole
//! request, since every remaining call would fail the same way.
//!
//! ## Fork-join with indexed slots
//!
//! Per-file normalization + OCR fan out through `buffer_unordered` bounded
//! by `config.concurrency`; each task carries its upload index and writes
//! into a pre-sized slot vector on join. Upload order is therefore a
//! property of the data structure, not of completion timing. The single
//! analysis call only starts after every slot is filled, and cancelling the
//! returned future cancels all in-flight provider calls before the analysis
//! call can be issued.

use crate::config::AnalyzerConfig;
use crate::document::{ExtractionStatus, OcrResult, UploadedFile};
use crate::error::{AnalyzeError, FileError};
use crate::pipeline::ocr::OcrOutcome;
use crate::pipeline::{aggregate, analysis, normalize, ocr};
use crate::provider::{LlmClient, OcrClient, ProviderError, ProviderErrorKind};
use crate::report::{AnalysisOutcome, AnalysisReport, AnalysisStats, FileStatus};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The injected provider handles for one pipeline instance.
///
/// Cloning is cheap (two `Arc`s); tests substitute deterministic stubs.
#[derive(Clone)]
pub struct Clients {
    pub ocr: Arc<dyn OcrClient>,
    pub llm: Arc<dyn LlmClient>,
}

impl Clients {
    pub fn new(ocr: Arc<dyn OcrClient>, llm: Arc<dyn LlmClient>) -> Self {
        Self { ocr, llm }
    }

    /// Build real HTTP clients from configuration and environment
    /// credentials (`OCR_API_KEY`, `LLM_API_KEY`).
    ///
    /// Fails with [`AnalyzeError::MissingCredentials`] before any network
    /// call when either key is absent.
    pub fn from_env(config: &AnalyzerConfig) -> Result<Self, AnalyzeError> {
        let ocr_key = std::env::var("OCR_API_KEY").unwrap_or_default();
        if ocr_key.is_empty() {
            return Err(AnalyzeError::MissingCredentials {
                provider: "ocr".into(),
                env_hint: "OCR_API_KEY".into(),
            });
        }
        let llm_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        if llm_key.is_empty() {
            return Err(AnalyzeError::MissingCredentials {
                provider: "llm".into(),
                env_hint: "LLM_API_KEY (or OPENAI_API_KEY)".into(),
            });
        }

        let ocr = crate::provider::HttpOcrClient::new(&config.ocr_endpoint, ocr_key)
            .map_err(|e| AnalyzeError::Internal(e.to_string()))?;
        let llm =
            crate::provider::OpenAiCompatClient::new(&config.llm_base_url, llm_key, &config.model)
                .map_err(|e| AnalyzeError::Internal(e.to_string()))?
                .with_sampling(config.temperature, config.max_tokens);

        Ok(Self::new(Arc::new(ocr), Arc::new(llm)))
    }
}

/// Terminal per-file state after the fork-join phase.
enum FileOutcome {
    Extracted(OcrResult),
    Rejected(FileError),
    Fatal(ProviderError),
}

/// Analyze one request: normalize and OCR every file concurrently, join,
/// aggregate, then run the analysis engine at most once.
///
/// # Returns
/// `Ok(AnalysisReport)` whenever the pipeline ran, including when every
/// file failed (findings are then `Skipped` and each file carries its
/// reason).
///
/// # Errors
/// Returns `Err(AnalyzeError)` only for request-level failures: an empty
/// request, too many files, or an authentication/quota rejection from a
/// provider.
pub async fn analyze(
    files: Vec<UploadedFile>,
    config: &AnalyzerConfig,
    clients: &Clients,
) -> Result<AnalysisReport, AnalyzeError> {
    let total_start = Instant::now();

    if files.is_empty() {
        return Err(AnalyzeError::EmptyRequest);
    }
    if files.len() > config.max_files {
        return Err(AnalyzeError::InvalidConfig(format!(
            "request has {} files, limit is {}",
            files.len(),
            config.max_files
        )));
    }

    let total_files = files.len();
    info!(total_files, "starting analysis request");
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_start(total_files);
    }

    // ── Fork: per-file normalize + OCR, joined into indexed slots ────────
    let ocr_start = Instant::now();
    let mut slots: Vec<Option<FileOutcome>> = Vec::with_capacity(total_files);
    slots.resize_with(total_files, || None);

    let outcomes = stream::iter(files.iter().enumerate().map(|(index, file)| {
        let ocr_client = Arc::clone(&clients.ocr);
        let config = config.clone();
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_start(&file.filename);
            }
            let outcome = process_file(&ocr_client, file, &config).await;
            if let Some(ref cb) = config.progress_callback {
                match &outcome {
                    FileOutcome::Extracted(r) if r.has_text() => {
                        cb.on_file_extracted(&file.filename, r.text().len())
                    }
                    FileOutcome::Extracted(r) => cb.on_file_failed(
                        &file.filename,
                        r.error_detail.as_deref().unwrap_or("no text extracted"),
                    ),
                    FileOutcome::Rejected(e) => cb.on_file_failed(&file.filename, &e.to_string()),
                    FileOutcome::Fatal(e) => cb.on_file_failed(&file.filename, &e.to_string()),
                }
            }
            (index, outcome)
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect::<Vec<_>>()
    .await;

    for (index, outcome) in outcomes {
        slots[index] = Some(outcome);
    }
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Surface fatal provider errors before anything else ───────────────
    let mut ordered: Vec<FileOutcome> = Vec::with_capacity(total_files);
    for slot in slots {
        let outcome = slot.ok_or_else(|| AnalyzeError::Internal("unfilled result slot".into()))?;
        if let FileOutcome::Fatal(e) = outcome {
            return Err(match e.kind {
                ProviderErrorKind::Authentication => AnalyzeError::AuthenticationFailed {
                    provider: "ocr".into(),
                    detail: e.message,
                },
                ProviderErrorKind::Quota => AnalyzeError::QuotaExceeded {
                    provider: "ocr".into(),
                    detail: e.message,
                },
                _ => AnalyzeError::Internal(e.message),
            });
        }
        ordered.push(outcome);
    }

    // ── Aggregate readable text, keep the per-file ledger ────────────────
    let ocr_results: Vec<OcrResult> = ordered
        .iter()
        .filter_map(|o| match o {
            FileOutcome::Extracted(r) => Some(r.clone()),
            _ => None,
        })
        .collect();
    let (corpus, _ocr_failures) = aggregate::aggregate(&ocr_results);
    let file_statuses = build_ledger(&files, &ordered);

    // ── Short-circuit: nothing readable, engine never invoked ────────────
    if corpus.is_empty() {
        warn!("every file failed extraction; skipping analysis");
        let stats = stats_from(&file_statuses, ocr_duration_ms, 0, total_start);
        if let Some(ref cb) = config.progress_callback {
            cb.on_request_complete(total_files, 0);
        }
        return Ok(AnalysisReport {
            analysis: AnalysisOutcome::Skipped,
            files: file_statuses,
            stats,
        });
    }

    // ── Single analysis call over the joined corpus ──────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_analysis_start(corpus.sections.len());
    }
    let analysis_start = Instant::now();
    let outcome = analysis::analyze_corpus(&clients.llm, &corpus, config).await?;
    let analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;

    let stats = stats_from(
        &file_statuses,
        ocr_duration_ms,
        analysis_duration_ms,
        total_start,
    );
    info!(
        extracted = stats.extracted_files,
        failed = stats.failed_files,
        total_ms = stats.total_duration_ms,
        "analysis request complete"
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_complete(total_files, stats.extracted_files);
    }

    Ok(AnalysisReport {
        analysis: outcome,
        files: file_statuses,
        stats,
    })
}

/// Normalize then OCR one file; every failure is folded into a terminal
/// outcome so a bad file cannot poison its siblings.
async fn process_file(
    ocr_client: &Arc<dyn OcrClient>,
    file: &UploadedFile,
    config: &AnalyzerConfig,
) -> FileOutcome {
    let doc = match normalize::normalize_file(file, config) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(filename = %file.filename, error = %e, "file rejected by normalizer");
            return FileOutcome::Rejected(e);
        }
    };

    match ocr::extract_document(ocr_client, &doc, config).await {
        OcrOutcome::Completed(result) => FileOutcome::Extracted(result),
        OcrOutcome::Fatal(e) => FileOutcome::Fatal(e),
    }
}

/// One ledger entry per upload, in upload order.
fn build_ledger(files: &[UploadedFile], outcomes: &[FileOutcome]) -> Vec<FileStatus> {
    files
        .iter()
        .zip(outcomes)
        .map(|(file, outcome)| match outcome {
            FileOutcome::Extracted(r) if r.has_text() => FileStatus {
                filename: file.filename.clone(),
                status: r.status,
                retries: r.retries,
                // Partial extractions carry the provider's page-failure
                // detail; clean successes have none.
                detail: r.error_detail.clone(),
                error: None,
            },
            FileOutcome::Extracted(r) => FileStatus {
                filename: file.filename.clone(),
                status: ExtractionStatus::Failed,
                retries: r.retries,
                detail: None,
                error: Some(FileError::OcrFailed {
                    filename: file.filename.clone(),
                    retries: r.retries,
                    detail: r
                        .error_detail
                        .clone()
                        .unwrap_or_else(|| "no text extracted".into()),
                }),
            },
            FileOutcome::Rejected(e) => FileStatus {
                filename: file.filename.clone(),
                status: ExtractionStatus::Failed,
                retries: 0,
                detail: None,
                error: Some(e.clone()),
            },
            // Fatal outcomes abort before the ledger is built.
            FileOutcome::Fatal(_) => FileStatus {
                filename: file.filename.clone(),
                status: ExtractionStatus::Failed,
                retries: 0,
                detail: None,
                error: None,
            },
        })
        .collect()
}

fn stats_from(
    files: &[FileStatus],
    ocr_duration_ms: u64,
    analysis_duration_ms: u64,
    total_start: Instant,
) -> AnalysisStats {
    let extracted = files.iter().filter(|f| f.succeeded()).count();
    AnalysisStats {
        total_files: files.len(),
        extracted_files: extracted,
        failed_files: files.len() - extracted,
        ocr_duration_ms,
        analysis_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    }
}
