//! Output-side data model: findings, per-file ledger, and the final report.
//!
//! Everything here is `Serialize`/`Deserialize`: the report is the one
//! artifact handed to presentation layers, so its shape must stay stable
//! and serializable. Nothing in this module is persisted by the library;
//! the report lives only as long as the caller keeps it.

use crate::document::ExtractionStatus;
use crate::error::FileError;
use serde::{Deserialize, Serialize};

/// Patient identity and clinical context extracted from the corpus.
///
/// Values are `"not found"` when the documents do not contain them; the
/// prompt forbids the model from omitting a field entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientData {
    pub name: String,
    pub age: String,
    pub sex: String,
    /// 3-4 sentences covering chief complaint, findings, and diagnoses.
    pub clinical_summary: String,
}

/// Overall validity of the analyzed documents, derived from the
/// compliance audit: `Valid` when every required element was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Valid,
    #[default]
    Failed,
}

/// Audit of required document elements, each `"Found"` or `"Missing"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAudit {
    pub patient_name: String,
    pub date: String,
    pub medication: String,
    pub physician_signature: String,
}

impl ComplianceAudit {
    /// Elements the model marked `"Missing"`, in field order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for (label, value) in [
            ("patient_name", &self.patient_name),
            ("date", &self.date),
            ("medication", &self.medication),
            ("physician_signature", &self.physician_signature),
        ] {
            if !value.eq_ignore_ascii_case("found") {
                out.push(label);
            }
        }
        out
    }

    /// `Valid` when every audited element was found.
    pub fn document_status(&self) -> DocumentStatus {
        if self.missing().is_empty() {
            DocumentStatus::Valid
        } else {
            DocumentStatus::Failed
        }
    }
}

/// Structured medical findings produced by one Analysis Engine invocation.
///
/// Every field except `caveats` and `source_files` is a required category:
/// a model response missing one fails schema validation and triggers the
/// corrective retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalFindings {
    pub patient: PatientData,
    /// Patient-friendly narrative summary across all readable documents.
    pub summary: String,
    /// Plain-language explanation of the diagnosed or likely condition.
    pub condition_explanation: String,
    /// One entry per medication: "Name: Dosage - Frequency - Purpose".
    pub medications: Vec<String>,
    /// Suggested next steps as a single paragraph.
    pub care_guidance: String,
    pub compliance: ComplianceAudit,
    /// Derived from `compliance` after parsing; the model's own value, if
    /// any, is ignored.
    #[serde(default)]
    pub document_status: DocumentStatus,
    /// Uncertainty the model flagged instead of guessing.
    #[serde(default)]
    pub caveats: Vec<String>,
    /// Filenames whose text contributed to the findings.
    #[serde(default)]
    pub source_files: Vec<String>,
}

/// Outcome of the single Analysis Engine call for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The model returned valid structured findings.
    Complete { findings: MedicalFindings },
    /// Both attempts returned text that failed schema validation; the raw
    /// model output is preserved rather than silently dropped.
    ParseFailed { raw_output: String, detail: String },
    /// Every file failed OCR, so the engine was never invoked.
    Skipped,
}

impl AnalysisOutcome {
    pub fn findings(&self) -> Option<&MedicalFindings> {
        match self {
            AnalysisOutcome::Complete { findings } => Some(findings),
            _ => None,
        }
    }
}

/// Ledger entry for one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStatus {
    pub filename: String,
    pub status: ExtractionStatus,
    /// Transient OCR retries spent on this file.
    pub retries: u32,
    /// Provider detail for a partial extraction, e.g. which pages were
    /// unreadable. `None` for clean successes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Present when status is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FileError>,
}

impl FileStatus {
    pub fn succeeded(&self) -> bool {
        self.status != ExtractionStatus::Failed
    }
}

/// Timing and volume statistics for one request.
///
/// Durations are wall-clock and therefore excluded from any byte-equality
/// comparison between reports; see [`AnalysisReport::content_fingerprint`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total_files: usize,
    pub extracted_files: usize,
    pub failed_files: usize,
    pub ocr_duration_ms: u64,
    pub analysis_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The final response for one analysis request: findings plus the per-file
/// processing ledger. Always returned, even on total OCR failure, so the
/// caller can distinguish "nothing could be read" from "read but
/// inconclusive".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis: AnalysisOutcome,
    /// One entry per uploaded file, in upload order.
    pub files: Vec<FileStatus>,
    pub stats: AnalysisStats,
}

impl AnalysisReport {
    /// Deterministic serialization of everything except wall-clock stats.
    ///
    /// With stubbed deterministic providers, two runs over identical bytes
    /// produce identical fingerprints.
    pub fn content_fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Content<'a> {
            analysis: &'a AnalysisOutcome,
            files: &'a [FileStatus],
        }
        serde_json::to_string(&Content {
            analysis: &self.analysis,
            files: &self.files,
        })
        .unwrap_or_default()
    }
}
