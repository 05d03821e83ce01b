//! OCR for downloaded decrees.
//!
//! - [`OcrSpaceEngine`]: one OCR.space call per payload
//! - [`OcrExtractor`]: page splitting under provider limits and API key
//!   rotation on quota errors
//!
//! The crawler only sees the [`TextExtractor`] trait.

mod error;
mod extractor;
mod ocr_space;
pub(crate) mod pdf;

pub use error::{OcrError, QUOTA_MARKERS};
pub use extractor::{ExtractedText, OcrExtractor, SplitLimits, TextExtractor};
pub use ocr_space::{OcrEngine, OcrOptions, OcrSpaceEngine, OCR_TIMEOUT, PROVIDER};
