//! Provider client seams: OCR and LLM as injected trait objects.
//!
//! Both external services are reached through object-safe async traits so
//! the pipeline never knows whether it is talking to a real HTTP endpoint
//! or a deterministic stub. Tests inject stubs; the CLI builds the real
//! clients in this module from configuration.
//!
//! Error classification lives here too: every provider failure is either
//! *transient* (worth retrying with backoff) or *permanent* (retry cannot
//! help), and the pipeline's retry machinery consults exactly that flag.

pub mod llm;
pub mod ocr;

pub use llm::OpenAiCompatClient;
pub use ocr::HttpOcrClient;

use async_trait::async_trait;
use thiserror::Error;

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The call exceeded its deadline. Transient.
    Timeout,
    /// 5xx-class error or connection failure. Transient.
    Unavailable,
    /// Credential rejected (401/403). Permanent; aborts the request.
    Authentication,
    /// Quota or rate limit exhausted (429). Permanent; aborts the request.
    Quota,
    /// The provider rejected the input itself (400/422). Permanent.
    InvalidInput,
    /// Anything else the provider said that we could not classify. Permanent.
    Other,
}

/// Error from a provider call, carrying its retry classification.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Timeout | ProviderErrorKind::Unavailable
        )
    }

    /// Whether this failure invalidates the whole request, not just one file.
    pub fn aborts_request(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Authentication | ProviderErrorKind::Quota
        )
    }

    /// Classify an HTTP status code from either provider.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Authentication,
            429 => ProviderErrorKind::Quota,
            400 | 413 | 415 | 422 => ProviderErrorKind::InvalidInput,
            408 => ProviderErrorKind::Timeout,
            s if s >= 500 => ProviderErrorKind::Unavailable,
            _ => ProviderErrorKind::Other,
        };
        Self::new(kind, format!("HTTP {}: {}", status, body.into()))
    }
}

/// Text extracted by the OCR provider for one document.
#[derive(Debug, Clone, Default)]
pub struct OcrResponse {
    /// Per-page (or per-region) text in document reading order. Pages the
    /// provider could not read appear as empty strings.
    pub blocks: Vec<String>,
    /// Pages the provider reported as unreadable.
    pub pages_failed: usize,
}

impl OcrResponse {
    /// Whether any page failed while others were read.
    pub fn is_partial(&self) -> bool {
        self.pages_failed > 0 && self.blocks.iter().any(|b| !b.trim().is_empty())
    }
}

/// Client for the external OCR provider.
///
/// Implementations must be safe to call concurrently for sibling documents
/// of the same request; they hold no per-call mutable state.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// Extract text from one document. The call itself carries no retry
    /// logic; the pipeline wraps it with timeout and backoff.
    async fn extract(&self, bytes: &[u8], media_type: &str) -> Result<OcrResponse, ProviderError>;
}

/// Client for the external language-model provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion over the given prompt and return the raw
    /// response text.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ProviderError::from_status(401, "").kind,
            ProviderErrorKind::Authentication
        );
        assert_eq!(
            ProviderError::from_status(429, "").kind,
            ProviderErrorKind::Quota
        );
        assert_eq!(
            ProviderError::from_status(503, "").kind,
            ProviderErrorKind::Unavailable
        );
        assert_eq!(
            ProviderError::from_status(422, "").kind,
            ProviderErrorKind::InvalidInput
        );
        assert_eq!(
            ProviderError::from_status(408, "").kind,
            ProviderErrorKind::Timeout
        );
        assert_eq!(
            ProviderError::from_status(302, "").kind,
            ProviderErrorKind::Other
        );
    }

    #[test]
    fn transient_vs_permanent() {
        assert!(ProviderError::timeout("t").is_transient());
        assert!(ProviderError::unavailable("u").is_transient());
        assert!(!ProviderError::from_status(401, "").is_transient());
        assert!(!ProviderError::from_status(400, "").is_transient());
    }

    #[test]
    fn auth_and_quota_abort_request() {
        assert!(ProviderError::from_status(403, "").aborts_request());
        assert!(ProviderError::from_status(429, "").aborts_request());
        assert!(!ProviderError::from_status(500, "").aborts_request());
    }

    #[test]
    fn partial_requires_some_text() {
        let all_failed = OcrResponse {
            blocks: vec!["".into(), "".into()],
            pages_failed: 2,
        };
        assert!(!all_failed.is_partial());

        let partial = OcrResponse {
            blocks: vec!["text".into(), "".into()],
            pages_failed: 1,
        };
        assert!(partial.is_partial());
    }
}
