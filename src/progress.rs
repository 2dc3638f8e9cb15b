//! Progress-callback trait for per-file pipeline events.
//!
//! Inject an `Arc<dyn AnalysisProgressCallback>` via
//! [`crate::config::AnalyzerConfigBuilder::progress_callback`] to receive
//! events as each file moves through OCR and as the analysis call runs.
//!
//! # Why callbacks instead of channels?
//!
//! The callback is the least-invasive integration point: callers can
//! forward events to a channel, a WebSocket, or a terminal progress bar
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because files are extracted concurrently.

/// Called by the pipeline as it processes each file of a request.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `on_file_*` methods may be called concurrently
/// from different tasks; implementations must synchronise shared state.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before any file is processed.
    fn on_request_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file's OCR extraction begins.
    fn on_file_start(&self, filename: &str) {
        let _ = filename;
    }

    /// Called when a file reaches a readable terminal state (success or
    /// partial), with the recovered text length in bytes.
    fn on_file_extracted(&self, filename: &str, text_len: usize) {
        let _ = (filename, text_len);
    }

    /// Called when a file fails normalization or exhausts its OCR retries.
    fn on_file_failed(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }

    /// Called just before the single analysis call is issued.
    fn on_analysis_start(&self, readable_files: usize) {
        let _ = readable_files;
    }

    /// Called once the report is assembled.
    fn on_request_complete(&self, total_files: usize, readable_files: usize) {
        let _ = (total_files, readable_files);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}
