use thiserror::Error;

/// Substrings (lowercase) that mark an error as a quota or rate-limit
/// condition. Such errors move extraction on to the next API key.
pub const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "credit",
    "too many requests",
    "429",
    "rate limit",
    "maximum ocr requests",
];

/// Errors from OCR extraction.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("No OCR API key available")]
    NoApiKey,

    #[error("OCR HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("OCR rate limit hit (HTTP 429), retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("OCR processing failed: {0}")]
    Processing(String),

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),

    #[error("OCR request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("PDF error: {0}")]
    Pdf(String),
}

impl OcrError {
    /// True when the error reads like an exhausted quota or a rate limit.
    pub fn is_quota_like(&self) -> bool {
        if matches!(self, OcrError::RateLimited { .. }) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        QUOTA_MARKERS.iter().any(|marker| message.contains(marker))
    }
}

impl From<lopdf::Error> for OcrError {
    fn from(err: lopdf::Error) -> Self {
        OcrError::Pdf(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_like_messages() {
        let quota = [
            "You may only perform this action upto maximum OCR requests per day",
            "Quota exceeded for this key",
            "No credits left",
            "Too Many Requests",
        ];
        for msg in quota {
            assert!(
                OcrError::Processing(msg.to_string()).is_quota_like(),
                "{msg}"
            );
        }

        assert!(OcrError::RateLimited {
            retry_after_secs: None
        }
        .is_quota_like());
        assert!(OcrError::Http {
            status: 403,
            body: "Rate limit reached".to_string()
        }
        .is_quota_like());
    }

    #[test]
    fn test_other_errors_are_not_quota_like() {
        assert!(!OcrError::Processing("Unable to recognize the file type".into()).is_quota_like());
        assert!(!OcrError::Http {
            status: 500,
            body: "internal error".into()
        }
        .is_quota_like());
        assert!(!OcrError::Pdf("invalid xref".into()).is_quota_like());
    }
}
