//! # meddoc-analyzer
//!
//! Analyze user-supplied medical documents (PDF or image) into structured
//! findings using an external OCR provider and a language model.
//!
//! ## Why this crate?
//!
//! Medical paperwork arrives as scans, phone photos, and machine-generated
//! PDFs, often several per visit. Reading them one at a time loses the
//! cross-references (the prescription explains the discharge summary).
//! This crate OCRs every file of a request concurrently, merges the text
//! into one ordered corpus, and runs a single LLM extraction over it so the
//! findings stay consistent across documents.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Normalize  validate PDF/PNG/JPEG uploads locally (per file)
//!  ├─ 2. OCR        concurrent provider calls with retry + backoff
//!  ├─ 3. Aggregate  join per-file text in upload order, label sources
//!  ├─ 4. Analyze    one LLM call, strict-JSON findings, corrective retry
//!  └─ 5. Report     findings + per-file status ledger
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meddoc_analyzer::{analyze, AnalyzerConfig, Clients, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyzerConfig::default();
//!     // Reads OCR_API_KEY and LLM_API_KEY from the environment.
//!     let clients = Clients::from_env(&config)?;
//!
//!     let files = vec![UploadedFile::new(
//!         "visit.pdf",
//!         "application/pdf",
//!         std::fs::read("visit.pdf")?,
//!     )];
//!
//!     let report = analyze(files, &config, &clients).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Per-file problems (unsupported format, corrupt bytes, exhausted OCR
//! retries) land in the report's ledger and never abort sibling files.
//! Request-level problems (no credentials, provider auth/quota rejection)
//! return `Err` before or instead of a report. A malformed model response
//! earns one corrective retry; if that also fails, the raw model text is
//! returned in the report rather than discarded.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod report;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, Clients};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, ACCEPTED_EXTENSIONS};
pub use document::{
    AggregatedCorpus, CorpusSection, DocumentKind, ExtractionStatus, NormalizedDocument, OcrResult,
    UploadedFile,
};
pub use error::{AnalyzeError, FileError};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback};
pub use provider::{
    HttpOcrClient, LlmClient, OcrClient, OcrResponse, OpenAiCompatClient, ProviderError,
    ProviderErrorKind,
};
pub use report::{
    AnalysisOutcome, AnalysisReport, AnalysisStats, ComplianceAudit, DocumentStatus, FileStatus,
    MedicalFindings, PatientData,
};
