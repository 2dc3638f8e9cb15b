//! Content aggregation: merge per-file OCR results into one ordered corpus.
//!
//! The input slice arrives already in upload order (the orchestrator's
//! indexed result slots guarantee that regardless of which extraction
//! finished first), so this stage only has to filter and label. Files whose
//! extraction failed entirely are excluded from the corpus but surface as
//! failure records; when nothing was readable the corpus comes back empty
//! (no placeholder text is fabricated) and the orchestrator short-circuits.

use crate::document::{AggregatedCorpus, CorpusSection, ExtractionStatus, OcrResult};
use crate::error::FileError;
use tracing::debug;

/// Build the corpus and the failure ledger from the ordered OCR results.
///
/// Partial results contribute whatever text was recovered; their provider
/// detail is preserved in the report's per-file ledger, not dropped.
pub fn aggregate(results: &[OcrResult]) -> (AggregatedCorpus, Vec<FileError>) {
    let mut sections = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        if result.has_text() {
            sections.push(CorpusSection {
                filename: result.filename.clone(),
                text: result.text(),
                status: result.status,
            });
        } else {
            failures.push(FileError::OcrFailed {
                filename: result.filename.clone(),
                retries: result.retries,
                detail: result
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "no text extracted".to_string()),
            });
        }
    }

    debug!(
        readable = sections.len(),
        failed = failures.len(),
        "aggregated OCR results"
    );

    (AggregatedCorpus { sections }, failures)
}
