//! OCR.space engine.
//!
//! One request per PDF (or PDF slice): the document travels base64-encoded
//! in a multipart form, the key in the `apikey` header.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::OcrError;
use crate::config::DEFAULT_OCR_ENDPOINT;

/// Provider name recorded on documents.
pub const PROVIDER: &str = "ocr.space";

/// Per-call timeout for OCR requests, independent of the archive timeout.
pub const OCR_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest body excerpt kept in an HTTP error.
const MAX_ERROR_BODY: usize = 300;

/// Recognition options sent with each request.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOptions {
    pub language: String,
    pub detect_orientation: bool,
    pub scale: bool,
    pub is_table: bool,
    /// OCR engine (1, 2 or 3).
    pub engine: u8,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "fre".to_string(),
            detect_orientation: true,
            scale: true,
            is_table: false,
            engine: 2,
        }
    }
}

/// A single OCR call on one PDF payload.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(
        &self,
        pdf: &[u8],
        api_key: &str,
        options: &OcrOptions,
    ) -> Result<String, OcrError>;

    fn provider(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
    #[serde(default)]
    error_details: Option<String>,
}

impl OcrSpaceResponse {
    fn into_text(self) -> Result<String, OcrError> {
        if self.is_errored_on_processing {
            let message = match self.error_message {
                Some(ErrorMessage::One(msg)) => msg,
                Some(ErrorMessage::Many(msgs)) if !msgs.is_empty() => msgs.join(", "),
                _ => self
                    .error_details
                    .unwrap_or_else(|| "unknown error".to_string()),
            };
            return Err(OcrError::Processing(message));
        }

        // One parsed result per page.
        let texts: Vec<String> = self
            .parsed_results
            .into_iter()
            .filter_map(|r| r.parsed_text)
            .collect();
        Ok(texts.join("\n"))
    }
}

pub struct OcrSpaceEngine {
    client: Client,
    endpoint: String,
}

impl OcrSpaceEngine {
    pub fn new(endpoint: Option<&str>, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_OCR_ENDPOINT).to_string(),
        })
    }

    fn form(pdf: &[u8], options: &OcrOptions) -> Form {
        let encoded = base64::engine::general_purpose::STANDARD.encode(pdf);
        Form::new()
            .text("base64Image", format!("data:application/pdf;base64,{}", encoded))
            .text("language", options.language.clone())
            .text("isOverlayRequired", "false")
            .text("detectOrientation", options.detect_orientation.to_string())
            .text("scale", options.scale.to_string())
            .text("isTable", options.is_table.to_string())
            .text("OCREngine", options.engine.to_string())
    }
}

#[async_trait]
impl OcrEngine for OcrSpaceEngine {
    async fn recognize(
        &self,
        pdf: &[u8],
        api_key: &str,
        options: &OcrOptions,
    ) -> Result<String, OcrError> {
        debug!("OCR request: {} bytes, engine {}", pdf.len(), options.engine);
        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", api_key)
            .multipart(Self::form(pdf, options))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(OcrError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(OcrError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: OcrSpaceResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
        payload.into_text()
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_endpoint_defaults() {
        let engine = OcrSpaceEngine::new(None, OCR_TIMEOUT).unwrap();
        assert_eq!(engine.endpoint, DEFAULT_OCR_ENDPOINT);
        let engine = OcrSpaceEngine::new(Some("http://ocr.test/parse"), OCR_TIMEOUT).unwrap();
        assert_eq!(engine.endpoint, "http://ocr.test/parse");
    }

    fn parse(json: &str) -> Result<String, OcrError> {
        serde_json::from_str::<OcrSpaceResponse>(json)
            .unwrap()
            .into_text()
    }

    #[test]
    fn test_parsed_results_joined() {
        let text = parse(
            r#"{"ParsedResults":[{"ParsedText":"page one"},{"ParsedText":"page two"}],
                "IsErroredOnProcessing":false,"OCRExitCode":1}"#,
        )
        .unwrap();
        assert_eq!(text, "page one\npage two");
    }

    #[test]
    fn test_error_message_list() {
        let err = parse(
            r#"{"IsErroredOnProcessing":true,
                "ErrorMessage":["File failed validation.","Maximum OCR requests reached"]}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "OCR processing failed: File failed validation., Maximum OCR requests reached"
        );
        assert!(err.is_quota_like());
    }

    #[test]
    fn test_error_message_string_and_details() {
        let err = parse(r#"{"IsErroredOnProcessing":true,"ErrorMessage":"Bad file"}"#).unwrap_err();
        assert!(err.to_string().ends_with("Bad file"));

        let err = parse(r#"{"IsErroredOnProcessing":true,"ErrorDetails":"Timed out"}"#).unwrap_err();
        assert!(err.to_string().ends_with("Timed out"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(parse(r#"{"IsErroredOnProcessing":false}"#).unwrap(), "");
    }
}
