//! Size-aware OCR with API key rotation.
//!
//! A PDF that fits the provider's limits goes out in one call. Larger ones
//! are split into groups of pages, and groups that are still too big are
//! sent page by page.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::ocr_space::{OcrEngine, OcrOptions};
use super::{pdf, OcrError};

/// Provider limits for a single OCR call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitLimits {
    pub max_bytes: usize,
    pub max_pages_per_call: usize,
}

impl SplitLimits {
    pub fn from_kb(max_kb: usize, max_pages_per_call: usize) -> Self {
        Self {
            max_bytes: max_kb * 1024,
            max_pages_per_call: max_pages_per_call.max(1),
        }
    }

    fn max_kb(&self) -> usize {
        self.max_bytes / 1024
    }
}

impl Default for SplitLimits {
    fn default() -> Self {
        Self::from_kb(1024, 3)
    }
}

/// Text extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub provider: String,
    pub engine: u8,
}

/// Turns a downloaded PDF into text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        pdf: &[u8],
        api_keys: &[String],
        options: &OcrOptions,
        limits: SplitLimits,
    ) -> Result<ExtractedText, OcrError>;
}

pub struct OcrExtractor {
    engine: Arc<dyn OcrEngine>,
}

impl OcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    async fn extract_with_key(
        &self,
        buffer: &[u8],
        key: &str,
        options: &OcrOptions,
        limits: SplitLimits,
    ) -> Result<String, OcrError> {
        let doc = match pdf::load(buffer) {
            Ok(doc) => doc,
            Err(e) if buffer.len() <= limits.max_bytes => {
                debug!("PDF not parseable ({}), sending as-is", e);
                return self.engine.recognize(buffer, key, options).await;
            }
            Err(e) => return Err(e),
        };

        let pages = pdf::page_numbers(&doc);
        if buffer.len() <= limits.max_bytes && pages.len() <= limits.max_pages_per_call {
            return self.engine.recognize(buffer, key, options).await;
        }

        info!(
            "Splitting {} KB PDF ({} pages) into calls of {} pages",
            buffer.len() / 1024,
            pages.len(),
            limits.max_pages_per_call
        );

        let mut parts = Vec::new();
        for group in pages.chunks(limits.max_pages_per_call) {
            let chunk = pdf::subset(&doc, group)?;
            if chunk.len() <= limits.max_bytes {
                parts.push(self.engine.recognize(&chunk, key, options).await?);
                continue;
            }

            for &page in group {
                let single = pdf::subset(&doc, &[page])?;
                if single.len() <= limits.max_bytes {
                    parts.push(self.engine.recognize(&single, key, options).await?);
                    continue;
                }

                // Oversized page: try anyway, keep a marker if it fails.
                match self.engine.recognize(&single, key, options).await {
                    Ok(text) => parts.push(text),
                    Err(e) => {
                        warn!("OCR failed on oversized page {}: {}", page, e);
                        parts.push(format!(
                            "[OCR failed for page {} (> {} KB)]",
                            page,
                            limits.max_kb()
                        ));
                    }
                }
            }
        }

        let parts: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        Ok(parts.join("\n\n"))
    }
}

#[async_trait]
impl TextExtractor for OcrExtractor {
    /// Try each key in order. Quota-like failures move on to the next key;
    /// any other failure is returned at once.
    async fn extract(
        &self,
        buffer: &[u8],
        api_keys: &[String],
        options: &OcrOptions,
        limits: SplitLimits,
    ) -> Result<ExtractedText, OcrError> {
        let mut last_error = None;
        for (i, key) in api_keys.iter().enumerate() {
            match self.extract_with_key(buffer, key, options, limits).await {
                Ok(text) => {
                    return Ok(ExtractedText {
                        text,
                        provider: self.engine.provider().to_string(),
                        engine: options.engine,
                    })
                }
                Err(e) if e.is_quota_like() => {
                    warn!("OCR key #{} exhausted: {}", i + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(OcrError::NoApiKey))
    }
}
