//! Configuration types for the document analysis pipeline.
//!
//! All pipeline behaviour is controlled through [`AnalyzerConfig`], built via
//! its [`AnalyzerConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks and diff two runs to understand why
//! their reports differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::AnalyzeError;
use crate::progress::AnalysisProgressCallback;
use std::fmt;
use std::sync::Arc;

/// File extensions accepted by the normalizer.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

/// Configuration for one analysis pipeline instance.
///
/// Built via [`AnalyzerConfig::builder()`] or using
/// [`AnalyzerConfig::default()`].
///
/// # Example
/// ```rust
/// use meddoc_analyzer::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .concurrency(4)
///     .model("nvidia/nemotron-nano-12b-v2-vl:free")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Number of concurrent OCR extractions per request. Default: 5.
    ///
    /// OCR calls are network-bound; extracting five files at once typically
    /// cuts wall-clock time close to 5x on multi-file requests. Lower this
    /// if the provider rate-limits you.
    pub concurrency: usize,

    /// LLM model identifier sent to the chat-completions endpoint.
    /// Default: `"nvidia/nemotron-nano-12b-v2-vl:free"`.
    pub model: String,

    /// Base URL of the OpenAI-compatible LLM endpoint.
    /// Default: `"https://openrouter.ai/api/v1"`.
    pub llm_base_url: String,

    /// Endpoint URL of the OCR provider.
    pub ocr_endpoint: String,

    /// Sampling temperature for the extraction completion. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to what the documents say;
    /// creativity only hurts when the output must be traceable to the input.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per request. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient provider failure. Default: 3.
    ///
    /// Timeouts and 5xx errors are usually transient. Permanent errors
    /// (bad credentials, rejected input) are never retried and surface
    /// immediately.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms, 1 s, 2 s. Backoff stops N
    /// concurrent extractions from hammering a recovering endpoint in
    /// lockstep.
    pub retry_backoff_ms: u64,

    /// Per-provider-call timeout in seconds. Default: 60.
    ///
    /// A call that exceeds this is treated as a transient failure and fed
    /// into the retry policy.
    pub request_timeout_secs: u64,

    /// Maximum byte size for one uploaded PDF. Default: 10 MiB.
    pub max_pdf_bytes: usize,

    /// Maximum byte size for one uploaded image. Default: 5 MiB.
    pub max_image_bytes: usize,

    /// Maximum files accepted in one request. Default: 5.
    pub max_files: usize,

    /// Optional per-file progress callback, invoked as extractions start and
    /// finish. Default: none.
    pub progress_callback: Option<Arc<dyn AnalysisProgressCallback>>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            model: "nvidia/nemotron-nano-12b-v2-vl:free".to_string(),
            llm_base_url: "https://openrouter.ai/api/v1".to_string(),
            ocr_endpoint: "https://api.cloud.llamaindex.ai/api/parsing/upload".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            request_timeout_secs: 60,
            max_pdf_bytes: 10 * 1024 * 1024,
            max_image_bytes: 5 * 1024 * 1024,
            max_files: 5,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("llm_base_url", &self.llm_base_url)
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_pdf_bytes", &self.max_pdf_bytes)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("max_files", &self.max_files)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Size limit for a given document kind.
    pub fn size_limit(&self, kind: crate::document::DocumentKind) -> usize {
        match kind {
            crate::document::DocumentKind::Pdf => self.max_pdf_bytes,
            _ => self.max_image_bytes,
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm_base_url = url.into();
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_pdf_bytes(mut self, n: usize) -> Self {
        self.config.max_pdf_bytes = n;
        self
    }

    pub fn max_image_bytes(mut self, n: usize) -> Self {
        self.config.max_image_bytes = n;
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn AnalysisProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzeError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(AnalyzeError::InvalidConfig("concurrency must be >= 1".into()));
        }
        if c.model.is_empty() {
            return Err(AnalyzeError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_pdf_bytes == 0 || c.max_image_bytes == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "size limits must be non-zero".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(AnalyzeError::InvalidConfig(
                "request timeout must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = AnalyzerConfig::builder().build().unwrap();
        assert_eq!(c.concurrency, 5);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.request_timeout_secs, 60);
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let c = AnalyzerConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn temperature_clamped() {
        let c = AnalyzerConfig::builder().temperature(7.5).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn empty_model_rejected() {
        let err = AnalyzerConfig::builder().model("").build();
        assert!(matches!(err, Err(AnalyzeError::InvalidConfig(_))));
    }

    #[test]
    fn size_limit_per_kind() {
        use crate::document::DocumentKind;
        let c = AnalyzerConfig::builder()
            .max_pdf_bytes(100)
            .max_image_bytes(50)
            .build()
            .unwrap();
        assert_eq!(c.size_limit(DocumentKind::Pdf), 100);
        assert_eq!(c.size_limit(DocumentKind::Png), 50);
        assert_eq!(c.size_limit(DocumentKind::Jpeg), 50);
    }
}
