//! OCR extraction: drive the provider client to a terminal [`OcrResult`].
//!
//! ## Retry strategy
//!
//! Timeouts and 5xx-class provider errors are transient and frequent under
//! concurrent load; they go through the explicit state machine in
//! [`crate::retry`] with exponential backoff. Authentication, quota, and
//! malformed-input rejections are permanent: the first occurrence is
//! terminal, and auth/quota additionally abort the whole request once the
//! orchestrator sees them.
//!
//! Each invocation is independent; sibling extractions of the same request
//! share nothing but the (immutable) client handle.

use crate::config::AnalyzerConfig;
use crate::document::{ExtractionStatus, NormalizedDocument, OcrResult};
use crate::provider::{OcrClient, OcrResponse, ProviderError};
use crate::retry::{RetryPolicy, RetryState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Outcome of driving one document through OCR.
///
/// `Fatal` carries auth/quota failures upward so the orchestrator can abort
/// the request instead of burying a misconfigured credential in the ledger.
pub enum OcrOutcome {
    Completed(OcrResult),
    Fatal(ProviderError),
}

/// Extract text from one normalized document, retrying transient failures.
///
/// Always reaches a terminal state: `Completed` with status success,
/// partial, or failed, or `Fatal` for request-aborting provider errors.
pub async fn extract_document(
    client: &Arc<dyn OcrClient>,
    doc: &NormalizedDocument,
    config: &AnalyzerConfig,
) -> OcrOutcome {
    let policy = RetryPolicy::new(config.max_retries, config.retry_backoff_ms);
    let call_timeout = Duration::from_secs(config.request_timeout_secs);
    let mut state = policy.start();
    let mut retries = 0u32;
    let mut last_err: Option<ProviderError> = None;

    loop {
        match state {
            RetryState::Attempting { attempt } => {
                debug!(filename = %doc.filename, attempt, "OCR attempt");
                let call = client.extract(&doc.bytes, doc.kind.media_type());
                let result = match timeout(call_timeout, call).await {
                    Ok(r) => r,
                    Err(_) => Err(ProviderError::timeout(format!(
                        "OCR call exceeded {}s",
                        config.request_timeout_secs
                    ))),
                };

                match result {
                    Ok(response) => {
                        return OcrOutcome::Completed(result_from_response(
                            doc, response, retries,
                        ));
                    }
                    Err(e) if e.aborts_request() => {
                        warn!(filename = %doc.filename, error = %e, "OCR fatal provider error");
                        return OcrOutcome::Fatal(e);
                    }
                    Err(e) if e.is_transient() => {
                        warn!(
                            filename = %doc.filename,
                            attempt,
                            error = %e,
                            "transient OCR failure"
                        );
                        last_err = Some(e);
                        state = policy.after_transient_failure(state);
                    }
                    Err(e) => {
                        // Permanent, file-scoped: no retry can help.
                        warn!(filename = %doc.filename, error = %e, "permanent OCR failure");
                        return OcrOutcome::Completed(failed_result(doc, retries, e.to_string()));
                    }
                }
            }
            RetryState::BackingOff { delay, .. } => {
                sleep(delay).await;
                retries += 1;
                state = policy.after_backoff(state);
            }
            RetryState::Exhausted => {
                let detail = last_err
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown provider error".to_string());
                return OcrOutcome::Completed(failed_result(doc, retries, detail));
            }
        }
    }
}

/// Map a successful provider response onto the extraction status taxonomy.
fn result_from_response(
    doc: &NormalizedDocument,
    response: OcrResponse,
    retries: u32,
) -> OcrResult {
    let has_text = response.blocks.iter().any(|b| !b.trim().is_empty());
    let status = if !has_text {
        ExtractionStatus::Failed
    } else if response.is_partial() {
        ExtractionStatus::Partial
    } else {
        ExtractionStatus::Success
    };

    let error_detail = match status {
        ExtractionStatus::Success => None,
        ExtractionStatus::Partial => Some(format!(
            "{} of {} pages unreadable",
            response.pages_failed,
            response.blocks.len()
        )),
        ExtractionStatus::Failed => Some("provider returned no text".to_string()),
    };

    debug!(filename = %doc.filename, ?status, retries, "OCR terminal state");

    OcrResult {
        filename: doc.filename.clone(),
        status,
        blocks: response.blocks,
        error_detail,
        retries,
    }
}

fn failed_result(doc: &NormalizedDocument, retries: u32, detail: String) -> OcrResult {
    OcrResult {
        filename: doc.filename.clone(),
        status: ExtractionStatus::Failed,
        blocks: Vec::new(),
        error_detail: Some(detail),
        retries,
    }
}
