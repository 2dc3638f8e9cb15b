//! End-to-end pipeline tests with deterministic stub providers.
//!
//! No network, no real credentials: both provider traits are implemented by
//! scripted stubs, so every test is fast and reproducible. The stubs key
//! their responses off marker bytes embedded in the synthetic documents,
//! which also lets a test delay individual files to force out-of-order
//! completion.

use async_trait::async_trait;
use meddoc_analyzer::{
    analyze, AnalysisOutcome, AnalyzerConfig, Clients, ExtractionStatus, FileError, LlmClient,
    OcrClient, OcrResponse, ProviderError, ProviderErrorKind, UploadedFile,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Synthetic documents ──────────────────────────────────────────────────────

/// A structurally valid PDF carrying a marker comment the stub can find.
fn pdf_with_marker(marker: &str, pages: usize) -> Vec<u8> {
    let mut body = format!("%PDF-1.4\n%{marker}\n");
    body.push_str("1 0 obj << /Type /Catalog >> endobj\n");
    body.push_str("2 0 obj << /Type /Pages /Count 1 >> endobj\n");
    for i in 0..pages {
        body.push_str(&format!("{} 0 obj << /Type /Page >> endobj\n", i + 3));
    }
    body.push_str("trailer << /Root 1 0 R >>\n%%EOF\n");
    body.into_bytes()
}

/// A valid PNG with the marker appended after IEND (decoders ignore it).
fn png_with_marker(marker: &str) -> Vec<u8> {
    use image::{Rgba, RgbaImage};
    let img =
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([200, 200, 200, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf.extend_from_slice(marker.as_bytes());
    buf
}

// ── Stub providers ───────────────────────────────────────────────────────────

#[derive(Clone)]
enum OcrScript {
    /// Return this text, optionally after a delay.
    Text(&'static str, u64),
    /// Permanent provider failure for this document.
    Fail(ProviderErrorKind),
}

/// OCR stub keyed by marker bytes embedded in each document.
struct StubOcr {
    scripts: HashMap<&'static str, OcrScript>,
    calls: AtomicU32,
}

impl StubOcr {
    fn new(scripts: Vec<(&'static str, OcrScript)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts.into_iter().collect(),
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrClient for StubOcr {
    async fn extract(&self, bytes: &[u8], _media_type: &str) -> Result<OcrResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (marker, script) in &self.scripts {
            if bytes
                .windows(marker.len())
                .any(|w| w == marker.as_bytes())
            {
                return match script {
                    OcrScript::Text(text, delay_ms) => {
                        if *delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                        }
                        Ok(OcrResponse {
                            blocks: vec![text.to_string()],
                            pages_failed: 0,
                        })
                    }
                    OcrScript::Fail(kind) => Err(ProviderError::new(*kind, "scripted failure")),
                };
            }
        }
        Err(ProviderError::new(
            ProviderErrorKind::InvalidInput,
            "unknown document",
        ))
    }
}

/// LLM stub returning scripted responses in call order.
struct StubLlm {
    responses: Vec<String>,
    calls: AtomicU32,
    /// The prompts received, for assertions on corpus ordering.
    prompts: std::sync::Mutex<Vec<String>>,
}

impl StubLlm {
    fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses,
            calls: AtomicU32::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .get(n)
            .cloned()
            .ok_or_else(|| ProviderError::unavailable("script exhausted"))
    }
}

fn valid_findings_json() -> String {
    r#"{
        "patient": {"name":"Jane Doe","age":"45","sex":"Female","clinical_summary":"Chest pain, stable angina."},
        "summary": "The patient, Jane Doe, aged 45, presented with chest pain.",
        "condition_explanation": "Angina means the heart muscle briefly gets too little blood.",
        "medications": ["Aspirin: 75mg - daily - prophylaxis"],
        "care_guidance": "Follow up with cardiology within two weeks.",
        "compliance": {"patient_name":"Found","date":"Found","medication":"Found","physician_signature":"Found"},
        "caveats": []
    }"#
    .to_string()
}

fn fast_config() -> AnalyzerConfig {
    AnalyzerConfig::builder()
        .max_retries(1)
        .retry_backoff_ms(1)
        .request_timeout_secs(5)
        .build()
        .unwrap()
}

fn clients(ocr: Arc<StubOcr>, llm: Arc<StubLlm>) -> Clients {
    Clients::new(ocr, llm)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_file_never_reaches_ocr() {
    let ocr = StubOcr::new(vec![]);
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![UploadedFile::new(
        "notes.txt",
        "text/plain",
        b"plain text".to_vec(),
    )];

    let report = analyze(files, &fast_config(), &clients(ocr.clone(), llm))
        .await
        .unwrap();

    assert_eq!(ocr.call_count(), 0, "OCR must not be invoked");
    assert!(matches!(
        report.files[0].error,
        Some(FileError::UnsupportedFormat { .. })
    ));
}

#[tokio::test]
async fn corpus_preserves_upload_order_despite_completion_order() {
    // First file finishes last, last finishes first.
    let ocr = StubOcr::new(vec![
        ("mark-a", OcrScript::Text("text from A", 60)),
        ("mark-b", OcrScript::Text("text from B", 30)),
        ("mark-c", OcrScript::Text("text from C", 0)),
    ]);
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![
        UploadedFile::new("a.pdf", "application/pdf", pdf_with_marker("mark-a", 1)),
        UploadedFile::new("b.pdf", "application/pdf", pdf_with_marker("mark-b", 1)),
        UploadedFile::new("c.pdf", "application/pdf", pdf_with_marker("mark-c", 1)),
    ];

    let report = analyze(files, &fast_config(), &clients(ocr, llm.clone()))
        .await
        .unwrap();

    let findings = report.analysis.findings().expect("complete analysis");
    assert_eq!(findings.source_files, vec!["a.pdf", "b.pdf", "c.pdf"]);

    // The prompt must present the sections in upload order too.
    let prompts = llm.prompts.lock().unwrap();
    let prompt = &prompts[0];
    let a = prompt.find("text from A").unwrap();
    let b = prompt.find("text from B").unwrap();
    let c = prompt.find("text from C").unwrap();
    assert!(a < b && b < c, "corpus sections out of upload order");
}

#[tokio::test]
async fn all_files_failed_skips_analysis_engine() {
    let ocr = StubOcr::new(vec![
        ("mark-a", OcrScript::Fail(ProviderErrorKind::InvalidInput)),
        ("mark-b", OcrScript::Fail(ProviderErrorKind::InvalidInput)),
    ]);
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![
        UploadedFile::new("a.pdf", "application/pdf", pdf_with_marker("mark-a", 1)),
        UploadedFile::new("b.pdf", "application/pdf", pdf_with_marker("mark-b", 1)),
    ];

    let report = analyze(files, &fast_config(), &clients(ocr, llm.clone()))
        .await
        .unwrap();

    assert_eq!(llm.call_count(), 0, "analysis engine must not be invoked");
    assert!(matches!(report.analysis, AnalysisOutcome::Skipped));
    assert_eq!(report.stats.failed_files, 2);
    assert!(report.files.iter().all(|f| f.error.is_some()));
}

#[tokio::test]
async fn malformed_then_valid_model_response_recovers() {
    let ocr = StubOcr::new(vec![("mark-a", OcrScript::Text("corpus text", 0))]);
    let llm = StubLlm::new(vec![
        "Sure! The patient seems to have...".to_string(),
        valid_findings_json(),
    ]);
    let files = vec![UploadedFile::new(
        "a.pdf",
        "application/pdf",
        pdf_with_marker("mark-a", 1),
    )];

    let report = analyze(files, &fast_config(), &clients(ocr, llm.clone()))
        .await
        .unwrap();

    assert!(report.analysis.findings().is_some());
    assert_eq!(llm.call_count(), 2, "exactly one corrective retry");
}

#[tokio::test]
async fn malformed_twice_reports_parse_failure_with_raw_text() {
    let ocr = StubOcr::new(vec![("mark-a", OcrScript::Text("corpus text", 0))]);
    let llm = StubLlm::new(vec![
        "not json at all".to_string(),
        "still not json".to_string(),
    ]);
    let files = vec![UploadedFile::new(
        "a.pdf",
        "application/pdf",
        pdf_with_marker("mark-a", 1),
    )];

    let report = analyze(files, &fast_config(), &clients(ocr, llm))
        .await
        .unwrap();

    match &report.analysis {
        AnalysisOutcome::ParseFailed { raw_output, detail } => {
            assert_eq!(raw_output, "still not json");
            assert!(!detail.is_empty());
        }
        other => panic!("expected ParseFailed, got {other:?}"),
    }
    // The files themselves succeeded; only the analysis was inconclusive.
    assert_eq!(report.stats.extracted_files, 1);
}

#[tokio::test]
async fn mixed_request_isolates_the_rejected_file() {
    // A.pdf (valid, 2 pages), B.png (valid), C.txt (rejected).
    let ocr = StubOcr::new(vec![
        ("mark-a", OcrScript::Text("discharge summary text", 20)),
        ("mark-b", OcrScript::Text("lab report text", 0)),
    ]);
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![
        UploadedFile::new("A.pdf", "application/pdf", pdf_with_marker("mark-a", 2)),
        UploadedFile::new("B.png", "image/png", png_with_marker("mark-b")),
        UploadedFile::new("C.txt", "text/plain", b"just words".to_vec()),
    ];

    let report = analyze(files, &fast_config(), &clients(ocr.clone(), llm.clone()))
        .await
        .unwrap();

    // C rejected with UnsupportedFormat, A and B extracted.
    assert_eq!(report.files.len(), 3);
    assert_eq!(report.files[2].filename, "C.txt");
    assert!(matches!(
        report.files[2].error,
        Some(FileError::UnsupportedFormat { .. })
    ));
    assert_eq!(report.files[0].status, ExtractionStatus::Success);
    assert_eq!(report.files[1].status, ExtractionStatus::Success);

    // One analysis call over the A+B corpus, in upload order.
    assert_eq!(llm.call_count(), 1);
    assert_eq!(ocr.call_count(), 2, "C.txt never reached OCR");
    let findings = report.analysis.findings().unwrap();
    assert_eq!(findings.source_files, vec!["A.pdf", "B.png"]);
}

#[tokio::test]
async fn single_corrupt_pdf_yields_empty_report() {
    let ocr = StubOcr::new(vec![]);
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![UploadedFile::new(
        "broken.pdf",
        "application/pdf",
        b"%PDF-1.4\ntruncated, no trailer".to_vec(),
    )];

    let report = analyze(files, &fast_config(), &clients(ocr.clone(), llm.clone()))
        .await
        .unwrap();

    assert!(matches!(
        report.files[0].error,
        Some(FileError::CorruptDocument { .. })
    ));
    assert_eq!(ocr.call_count(), 0);
    assert_eq!(llm.call_count(), 0);
    assert!(matches!(report.analysis, AnalysisOutcome::Skipped));
}

#[tokio::test]
async fn identical_inputs_produce_identical_reports() {
    let run = || async {
        let ocr = StubOcr::new(vec![
            ("mark-a", OcrScript::Text("visit notes", 10)),
            ("mark-b", OcrScript::Text("lab values", 0)),
        ]);
        let llm = StubLlm::new(vec![valid_findings_json()]);
        let files = vec![
            UploadedFile::new("a.pdf", "application/pdf", pdf_with_marker("mark-a", 1)),
            UploadedFile::new("b.png", "image/png", png_with_marker("mark-b")),
        ];
        analyze(files, &fast_config(), &clients(ocr, llm))
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first.content_fingerprint(), second.content_fingerprint());
}

#[tokio::test]
async fn ocr_auth_failure_aborts_whole_request() {
    let ocr = StubOcr::new(vec![
        ("mark-a", OcrScript::Text("readable", 0)),
        ("mark-b", OcrScript::Fail(ProviderErrorKind::Authentication)),
    ]);
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![
        UploadedFile::new("a.pdf", "application/pdf", pdf_with_marker("mark-a", 1)),
        UploadedFile::new("b.pdf", "application/pdf", pdf_with_marker("mark-b", 1)),
    ];

    let err = analyze(files, &fast_config(), &clients(ocr, llm.clone()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        meddoc_analyzer::AnalyzeError::AuthenticationFailed { .. }
    ));
    assert_eq!(llm.call_count(), 0, "no analysis after credential failure");
}

#[tokio::test]
async fn empty_request_is_rejected() {
    let ocr = StubOcr::new(vec![]);
    let llm = StubLlm::new(vec![]);
    let err = analyze(vec![], &fast_config(), &clients(ocr, llm))
        .await
        .unwrap_err();
    assert!(matches!(err, meddoc_analyzer::AnalyzeError::EmptyRequest));
}

#[tokio::test]
async fn partial_extraction_is_included_in_corpus() {
    struct PartialOcr;
    #[async_trait]
    impl OcrClient for PartialOcr {
        async fn extract(&self, _: &[u8], _: &str) -> Result<OcrResponse, ProviderError> {
            Ok(OcrResponse {
                blocks: vec!["readable page".into(), "".into()],
                pages_failed: 1,
            })
        }
    }
    let llm = StubLlm::new(vec![valid_findings_json()]);
    let files = vec![UploadedFile::new(
        "partial.pdf",
        "application/pdf",
        pdf_with_marker("mark-a", 2),
    )];

    let report = analyze(
        files,
        &fast_config(),
        &Clients::new(Arc::new(PartialOcr), llm.clone()),
    )
    .await
    .unwrap();

    assert_eq!(report.files[0].status, ExtractionStatus::Partial);
    assert_eq!(llm.call_count(), 1, "partial text still gets analyzed");
    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].contains("readable page"));

    // The ledger must say which pages were unreadable, not just "partial".
    assert!(report.files[0].error.is_none(), "partial is not a failure");
    let detail = report.files[0].detail.as_deref().unwrap();
    assert!(detail.contains("1 of 2"), "got detail: {detail}");
}
