//! HTTP client for the external OCR provider.
//!
//! The provider exposes a single upload endpoint: we POST the document
//! bytes (base64 inside a JSON body) with a bearer token and get back
//! per-page text. Documents go up whole; the provider paginates PDFs
//! itself, which is why the normalizer never rasterises anything locally.

use crate::provider::{OcrClient, OcrResponse, ProviderError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OCR provider client speaking the JSON upload protocol.
#[derive(Debug)]
pub struct HttpOcrClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    /// Base64-encoded document content.
    content: String,
    media_type: &'a str,
    result_type: &'static str,
}

#[derive(Deserialize)]
struct ExtractResponse {
    pages: Vec<PageText>,
}

#[derive(Deserialize)]
struct PageText {
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

impl HttpOcrClient {
    /// Create a client for the given endpoint.
    ///
    /// Fails with [`ProviderError`] kind `Authentication` when the key is
    /// empty so a misconfigured deployment is caught before any upload.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ProviderError::new(
                super::ProviderErrorKind::Authentication,
                "OCR API key is empty",
            ));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::unavailable(format!("client build: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl OcrClient for HttpOcrClient {
    async fn extract(&self, bytes: &[u8], media_type: &str) -> Result<OcrResponse, ProviderError> {
        let body = ExtractRequest {
            content: STANDARD.encode(bytes),
            media_type,
            result_type: "text",
        };

        debug!(endpoint = %self.endpoint, media_type, size = bytes.len(), "OCR upload");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout(e.to_string())
                } else {
                    ProviderError::unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::unavailable(format!("malformed OCR response: {e}")))?;

        let pages_failed = parsed
            .pages
            .iter()
            .filter(|p| p.error.is_some() || p.text.trim().is_empty())
            .count();
        let blocks = parsed.pages.into_iter().map(|p| p.text).collect();

        Ok(OcrResponse {
            blocks,
            pages_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;

    #[test]
    fn empty_key_rejected_at_construction() {
        let err = HttpOcrClient::new("https://ocr.example/upload", "").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Authentication);
    }

    #[test]
    fn response_page_parsing_counts_failures() {
        let json = r#"{"pages":[{"text":"hello"},{"text":"","error":"blurred"},{"text":"world"}]}"#;
        let parsed: ExtractResponse = serde_json::from_str(json).unwrap();
        let failed = parsed
            .pages
            .iter()
            .filter(|p| p.error.is_some() || p.text.trim().is_empty())
            .count();
        assert_eq!(failed, 1);
        assert_eq!(parsed.pages.len(), 3);
    }
}
