//! Error types for the meddoc-analyzer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalyzeError`] is **fatal**: the request cannot proceed at all
//!   (no files supplied, missing credentials, provider rejected the API key).
//!   Returned as `Err(AnalyzeError)` from the top-level `analyze*` functions.
//!
//! * [`FileError`] is **non-fatal**: a single uploaded file failed
//!   (unsupported type, corrupt bytes, OCR gave up) but its siblings are
//!   fine. Stored inside [`crate::report::FileStatus`] so callers can
//!   inspect partial success rather than losing the whole request to one
//!   bad upload.
//!
//! The separation encodes the partial-failure policy of the orchestrator:
//! per-file errors land in the report ledger, credential and quota errors
//! abort the request before (or as soon as) they are observed.

use thiserror::Error;

/// All fatal errors returned by the meddoc-analyzer library.
///
/// Per-file failures use [`FileError`] and are stored in
/// [`crate::report::FileStatus`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The request contained no files at all.
    #[error("No files to analyze: the request must contain at least one document")]
    EmptyRequest,

    /// A required provider credential is missing from the configuration.
    ///
    /// Checked before any network call is made so a misconfigured deployment
    /// fails fast instead of burning per-file retries.
    #[error("Missing credential for provider '{provider}': set {env_hint}")]
    MissingCredentials { provider: String, env_hint: String },

    /// A provider rejected our credential (HTTP 401/403). Never retried;
    /// aborts the whole request because every sibling call would fail the
    /// same way.
    #[error("Authentication failed for provider '{provider}': {detail}")]
    AuthenticationFailed { provider: String, detail: String },

    /// A provider reported an exhausted quota (HTTP 429). Never retried;
    /// aborts the whole request.
    #[error("Quota exceeded for provider '{provider}': {detail}")]
    QuotaExceeded { provider: String, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single uploaded file.
///
/// Stored in the per-file ledger of [`crate::report::AnalysisReport`].
/// The overall request continues unless every file fails.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileError {
    /// The declared or detected type is not one of {pdf, png, jpg, jpeg}.
    #[error("'{filename}': unsupported format '{detected}'")]
    UnsupportedFormat { filename: String, detected: String },

    /// The bytes do not form a well-formed document of the declared type.
    #[error("'{filename}': corrupt document: {detail}")]
    CorruptDocument { filename: String, detail: String },

    /// The file exceeds the per-file size limit for its type.
    #[error("'{filename}': {size_bytes} bytes exceeds the {limit_bytes}-byte limit")]
    DocumentTooLarge {
        filename: String,
        size_bytes: usize,
        limit_bytes: usize,
    },

    /// OCR extraction failed, either permanently or after exhausting
    /// transient retries.
    #[error("'{filename}': OCR failed after {retries} retries: {detail}")]
    OcrFailed {
        filename: String,
        retries: u32,
        detail: String,
    },
}

impl FileError {
    /// The upload this error belongs to.
    pub fn filename(&self) -> &str {
        match self {
            FileError::UnsupportedFormat { filename, .. }
            | FileError::CorruptDocument { filename, .. }
            | FileError::DocumentTooLarge { filename, .. }
            | FileError::OcrFailed { filename, .. } => filename,
        }
    }
}
