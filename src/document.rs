//! Input-side data model: uploaded files, normalized documents, OCR results.
//!
//! Ownership is strictly linear: an [`UploadedFile`] is consumed by the
//! normalizer to produce a [`NormalizedDocument`], which is consumed by the
//! OCR extractor to produce an [`OcrResult`]. Nothing here is shared between
//! concurrent per-file extractions; each file's chain lives on its own task.

use serde::{Deserialize, Serialize};

/// One file received from the caller, immutable once constructed.
///
/// The declared media type is advisory; the normalizer cross-checks it
/// against the magic bytes and trusts the bytes when the two disagree.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename as declared by the uploader, used for labelling only.
    pub filename: String,
    /// Declared media type, e.g. `application/pdf` or `image/png`.
    /// May be empty when the transport did not supply one.
    pub media_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

/// Canonical document kind after normalization.
///
/// Only formats the OCR provider accepts can appear here; that invariant is
/// enforced by [`crate::pipeline::normalize::normalize_file`], the sole
/// constructor site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
}

impl DocumentKind {
    /// IANA media type string sent to the OCR provider.
    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
        }
    }
}

/// A validated document in a form the OCR provider accepts.
///
/// Derived from exactly one [`UploadedFile`]. PDFs pass through with their
/// bytes unchanged; images are decoded once to prove they are well-formed.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// Source filename, carried through for report labelling.
    pub filename: String,
    pub kind: DocumentKind,
    /// Page count for PDFs, 1 for images.
    pub page_count: usize,
    /// Canonical byte content.
    pub bytes: Vec<u8>,
}

/// Terminal state of one OCR extraction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Every page yielded text.
    Success,
    /// Some pages yielded text, others did not; recovered text is kept.
    Partial,
    /// No text was recovered.
    Failed,
}

/// OCR output for one normalized document. 1:1 with its source; merging
/// across files happens later in the aggregator, never here.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub filename: String,
    pub status: ExtractionStatus,
    /// Extracted text blocks in document reading order.
    pub blocks: Vec<String>,
    /// Provider error detail when status is not `Success`.
    pub error_detail: Option<String>,
    /// Transient retries spent before reaching the terminal state.
    pub retries: u32,
}

impl OcrResult {
    /// Whether any text was recovered (success or partial).
    pub fn has_text(&self) -> bool {
        self.status != ExtractionStatus::Failed && self.blocks.iter().any(|b| !b.trim().is_empty())
    }

    /// The recovered text joined in reading order.
    pub fn text(&self) -> String {
        self.blocks.join("\n")
    }
}

/// One labelled section of the aggregated corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSection {
    pub filename: String,
    pub text: String,
    /// Whether the source extraction was complete or partial.
    pub status: ExtractionStatus,
}

/// The combined, ordered text of every readable file in one request.
///
/// Section order matches upload order regardless of the order in which
/// concurrent extractions completed.
#[derive(Debug, Clone, Default)]
pub struct AggregatedCorpus {
    pub sections: Vec<CorpusSection>,
}

impl AggregatedCorpus {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Filenames that contributed text, in upload order.
    pub fn source_files(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.filename.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_kind_media_types() {
        assert_eq!(DocumentKind::Pdf.media_type(), "application/pdf");
        assert_eq!(DocumentKind::Png.media_type(), "image/png");
        assert_eq!(DocumentKind::Jpeg.media_type(), "image/jpeg");
    }

    #[test]
    fn ocr_result_has_text_ignores_whitespace_blocks() {
        let r = OcrResult {
            filename: "a.pdf".into(),
            status: ExtractionStatus::Partial,
            blocks: vec!["   ".into(), "\n".into()],
            error_detail: None,
            retries: 0,
        };
        assert!(!r.has_text());
    }

    #[test]
    fn ocr_result_text_joins_blocks_in_order() {
        let r = OcrResult {
            filename: "a.pdf".into(),
            status: ExtractionStatus::Success,
            blocks: vec!["page one".into(), "page two".into()],
            error_detail: None,
            retries: 0,
        };
        assert_eq!(r.text(), "page one\npage two");
    }

    #[test]
    fn failed_result_never_has_text() {
        let r = OcrResult {
            filename: "a.pdf".into(),
            status: ExtractionStatus::Failed,
            blocks: vec!["stale".into()],
            error_detail: Some("HTTP 500".into()),
            retries: 3,
        };
        assert!(!r.has_text());
    }

    #[test]
    fn corpus_source_files_preserve_order() {
        let corpus = AggregatedCorpus {
            sections: vec![
                CorpusSection {
                    filename: "first.pdf".into(),
                    text: "x".into(),
                    status: ExtractionStatus::Success,
                },
                CorpusSection {
                    filename: "second.png".into(),
                    text: "y".into(),
                    status: ExtractionStatus::Partial,
                },
            ],
        };
        assert_eq!(corpus.source_files(), vec!["first.pdf", "second.png"]);
    }
}
