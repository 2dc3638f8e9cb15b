//! Pipeline stages for medical document analysis.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap
//! implementations (e.g. switch OCR providers) without touching other
//! stages.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ ocr ──▶ aggregate ──▶ analysis
//! (validate)  (extract) (order+label) (LLM findings)
//! ```
//!
//! 1. [`normalize`]: validate an upload and canonicalise it into a form
//!    the OCR provider accepts; purely local, no network
//! 2. [`ocr`]: drive the OCR provider per document with timeout, backoff,
//!    and transient/permanent classification
//! 3. [`aggregate`]: merge per-file results into one ordered, labelled
//!    corpus plus a failure ledger
//! 4. [`analysis`]: build the deterministic prompt, call the LLM once,
//!    validate the structured response with a single corrective retry
//!
//! The orchestration over these stages (fork-join, order-preserving slots,
//! short-circuits) lives in [`crate::analyze`].

pub mod aggregate;
pub mod analysis;
pub mod normalize;
pub mod ocr;
