//! Finalized decree documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decree whose text has been extracted and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub year: i32,
    pub index: i64,
    pub title: Option<String>,
    pub text: String,
    /// Size of the downloaded PDF in bytes.
    pub bytes: i64,
    pub ocr_provider: String,
    pub ocr_confidence: Option<f64>,
    pub tag: Option<String>,
    pub category: Option<String>,
    /// Documents edited by a person are never removed by the budget enforcer.
    pub user_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when a crawl produces a document.
#[derive(Debug, Clone)]
pub struct NewDocumentData {
    pub url: String,
    pub year: i32,
    pub index: i64,
    pub text: String,
    pub bytes: i64,
    pub ocr_provider: String,
    pub ocr_confidence: Option<f64>,
}

/// Aggregate storage usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageTotals {
    pub documents: i64,
    pub bytes: i64,
}
