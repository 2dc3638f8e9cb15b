//! Prompt text for the LLM-driven structured extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the output schema or a rule
//!    requires editing exactly one place.
//!
//! 2. **Determinism**: the same corpus always produces byte-identical
//!    prompt text, so a deterministic stubbed provider yields a
//!    reproducible report.

use crate::document::AggregatedCorpus;

/// Fixed instruction describing the structured findings schema.
///
/// The schema mirrors [`crate::report::MedicalFindings`]; the two must stay
/// in sync or every response will fail validation.
pub const EXTRACTION_INSTRUCTIONS: &str = r#"You are a medical document analysis engine. You will receive the OCR-extracted text of one or more medical documents (prescriptions, discharge summaries, reports) belonging to a single patient encounter.

Follow these rules precisely:

1. ACCURACY
   - Extract only information present in the document text.
   - Never invent diagnoses, medications, or patient details.
   - When something is absent or illegible, write "not found" and add a
     short note to "caveats" instead of guessing.

2. PATIENT DATA
   - "patient.name": the exact full name, looking near labels such as
     'Name', 'Patient', 'MR.', 'MRS.', even across line breaks.
   - "patient.age": age in years, e.g. "45".
   - "patient.sex": "Male", "Female", "Other", or "not found".
   - "patient.clinical_summary": 3-4 sentences covering chief complaint,
     findings, and diagnoses.

3. SUMMARY
   - "summary": a short patient-friendly narrative across ALL documents,
     starting "The patient, [Name], aged [Age], ...".

4. CONDITION
   - "condition_explanation": explain the diagnosed condition in simple
     language; if no diagnosis is stated, describe the likely condition
     suggested by the documented symptoms and say it is uncertain.

5. MEDICATIONS
   - "medications": a list of strings, one per medication, formatted
     "Name: Dosage - Frequency - Purpose". List every medication that
     appears; an empty list means none were mentioned.

6. CARE GUIDANCE
   - "care_guidance": next steps as one continuous paragraph, no bullet
     points. Recommend a specialist type only when none is named.

7. COMPLIANCE AUDIT
   - "compliance": for each of patient_name, date, medication,
     physician_signature return "Found" only when the element is clearly
     present in the text; otherwise "Missing". Lab values do not count as
     medication.

8. OUTPUT FORMAT
   - Return STRICT JSON only, with exactly these top-level keys:
     patient, summary, condition_explanation, medications, care_guidance,
     compliance, caveats.
   - Every key is required. Use "not found" rather than omitting a key.
   - Do not wrap the JSON in markdown fences or add commentary."#;

/// Corrective instruction prepended on the single re-prompt after a
/// schema-validation failure.
pub const CORRECTIVE_PREFIX: &str = r#"Your previous response could not be parsed as JSON matching the required schema. Respond again with ONLY a single JSON object containing exactly the keys: patient, summary, condition_explanation, medications, care_guidance, compliance, caveats. No fences, no prose.

"#;

/// Marker line labelling each file's text inside the prompt.
fn section_header(filename: &str) -> String {
    format!("===== DOCUMENT: {filename} =====")
}

/// Build the single deterministic prompt for a request.
///
/// Sections appear in corpus order (which is upload order), each labelled
/// with its source filename so findings can be traced back to origin.
pub fn build_extraction_prompt(corpus: &AggregatedCorpus) -> String {
    let mut prompt = String::from(EXTRACTION_INSTRUCTIONS);
    prompt.push_str("\n\nEXTRACTED DOCUMENT TEXT:\n");
    for section in &corpus.sections {
        prompt.push('\n');
        prompt.push_str(&section_header(&section.filename));
        prompt.push('\n');
        prompt.push_str(section.text.trim_end());
        prompt.push('\n');
    }
    prompt
}

/// Build the corrective retry prompt from the same corpus.
pub fn build_corrective_prompt(corpus: &AggregatedCorpus) -> String {
    format!("{}{}", CORRECTIVE_PREFIX, build_extraction_prompt(corpus))
}
