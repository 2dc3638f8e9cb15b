//! Analysis engine: one LLM call per request, parsed into structured
//! findings.
//!
//! The engine is invoked exactly once per request (never per file) so the
//! model can cross-reference all readable documents in a single context.
//! Two independent retry layers apply:
//!
//! * transport level: timeouts and 5xx responses go through the same
//!   backoff state machine as OCR calls;
//! * schema level: a response that fails JSON/schema validation earns one
//!   corrective re-prompt; a second failure surfaces as `ParseFailed` with
//!   the raw model text attached rather than silently dropped.

use crate::config::AnalyzerConfig;
use crate::document::AggregatedCorpus;
use crate::error::AnalyzeError;
use crate::prompts;
use crate::provider::{LlmClient, ProviderError};
use crate::report::{AnalysisOutcome, MedicalFindings};
use crate::retry::{RetryPolicy, RetryState};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Matches the outermost JSON object or array in free-form model output.
/// Models wrap JSON in fences or prose often enough that parsing the whole
/// response directly fails on otherwise usable answers.
static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\{.*\}|\[.*\])").expect("static regex"));

/// Pull structured findings out of raw model text.
///
/// Tries the first JSON-looking block, then the full response. Schema
/// validation is serde itself: any missing required category fails
/// deserialization.
pub fn parse_findings(raw: &str) -> Result<MedicalFindings, String> {
    let candidate = JSON_BLOCK
        .find(raw)
        .map(|m| m.as_str())
        .unwrap_or(raw);
    serde_json::from_str::<MedicalFindings>(candidate)
        .or_else(|_| serde_json::from_str::<MedicalFindings>(raw))
        .map_err(|e| e.to_string())
}

/// Run the model once with transport-level retry and a call timeout.
async fn complete_with_retry(
    client: &Arc<dyn LlmClient>,
    prompt: &str,
    config: &AnalyzerConfig,
) -> Result<String, AnalyzeError> {
    let policy = RetryPolicy::new(config.max_retries, config.retry_backoff_ms);
    let call_timeout = Duration::from_secs(config.request_timeout_secs);
    let mut state = policy.start();
    let mut last_err: Option<ProviderError> = None;

    loop {
        match state {
            RetryState::Attempting { attempt } => {
                debug!(attempt, "LLM attempt");
                let result = match timeout(call_timeout, client.complete(prompt)).await {
                    Ok(r) => r,
                    Err(_) => Err(ProviderError::timeout(format!(
                        "LLM call exceeded {}s",
                        config.request_timeout_secs
                    ))),
                };

                match result {
                    Ok(text) => return Ok(text),
                    Err(e) if e.aborts_request() => {
                        return Err(map_fatal(e));
                    }
                    Err(e) if e.is_transient() => {
                        warn!(attempt, error = %e, "transient LLM failure");
                        last_err = Some(e);
                        state = policy.after_transient_failure(state);
                    }
                    Err(e) => {
                        return Err(AnalyzeError::Internal(format!(
                            "LLM provider rejected the request: {e}"
                        )));
                    }
                }
            }
            RetryState::BackingOff { delay, .. } => {
                sleep(delay).await;
                state = policy.after_backoff(state);
            }
            RetryState::Exhausted => {
                let detail = last_err
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown provider error".to_string());
                return Err(AnalyzeError::Internal(format!(
                    "LLM call failed after {} retries: {detail}",
                    config.max_retries
                )));
            }
        }
    }
}

fn map_fatal(e: ProviderError) -> AnalyzeError {
    match e.kind {
        crate::provider::ProviderErrorKind::Authentication => AnalyzeError::AuthenticationFailed {
            provider: "llm".into(),
            detail: e.message,
        },
        crate::provider::ProviderErrorKind::Quota => AnalyzeError::QuotaExceeded {
            provider: "llm".into(),
            detail: e.message,
        },
        _ => AnalyzeError::Internal(e.message),
    }
}

/// Analyze a non-empty corpus into structured findings.
///
/// Returns `Ok(AnalysisOutcome::Complete)` on a valid response,
/// `Ok(AnalysisOutcome::ParseFailed)` when both attempts fail schema
/// validation, and `Err` only for request-aborting provider errors.
pub async fn analyze_corpus(
    client: &Arc<dyn LlmClient>,
    corpus: &AggregatedCorpus,
    config: &AnalyzerConfig,
) -> Result<AnalysisOutcome, AnalyzeError> {
    debug_assert!(!corpus.is_empty(), "orchestrator must short-circuit first");

    let prompt = prompts::build_extraction_prompt(corpus);
    let first = complete_with_retry(client, &prompt, config).await?;

    match parse_findings(&first) {
        Ok(findings) => {
            info!("analysis parsed on first attempt");
            return Ok(complete_outcome(findings, corpus));
        }
        Err(detail) => {
            warn!(%detail, "analysis response failed validation, issuing corrective retry");
        }
    }

    let corrective = prompts::build_corrective_prompt(corpus);
    let second = complete_with_retry(client, &corrective, config).await?;

    match parse_findings(&second) {
        Ok(findings) => {
            info!("analysis parsed on corrective attempt");
            Ok(complete_outcome(findings, corpus))
        }
        Err(detail) => {
            warn!(%detail, "corrective attempt also failed validation");
            Ok(AnalysisOutcome::ParseFailed {
                raw_output: second,
                detail,
            })
        }
    }
}

/// Stamp the derived fields onto the findings; the model is not trusted to
/// report the contributing files or the overall document status.
fn complete_outcome(mut findings: MedicalFindings, corpus: &AggregatedCorpus) -> AnalysisOutcome {
    findings.source_files = corpus.source_files();
    findings.document_status = findings.compliance.document_status();
    AnalysisOutcome::Complete { findings }
}
