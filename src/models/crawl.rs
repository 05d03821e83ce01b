//! Crawl attempt tracking for individual decree URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build the download URL for a decree position.
///
/// `base_url` is the archive origin (e.g. `https://sgg.gouv.bj`); a trailing
/// slash is tolerated.
pub fn decree_url(base_url: &str, year: i32, index: i64) -> String {
    format!(
        "{}/doc/decret-{}-{}/download",
        base_url.trim_end_matches('/'),
        year,
        index
    )
}

/// Per-URL crawl state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Success,
    NotFound,
    Error,
    Excluded,
}

impl AttemptStatus {
    pub const ALL: [AttemptStatus; 5] = [
        Self::Pending,
        Self::Success,
        Self::NotFound,
        Self::Error,
        Self::Excluded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::Error => "error",
            Self::Excluded => "excluded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "success" => Some(Self::Success),
            "not_found" => Some(Self::NotFound),
            "error" => Some(Self::Error),
            "excluded" => Some(Self::Excluded),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A probe/fetch attempt record, keyed by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlAttempt {
    pub url: String,
    pub year: i32,
    pub index: i64,
    pub status: AttemptStatus,
    pub attempts: i32,
    pub last_visited_at: Option<DateTime<Utc>>,
    pub http_status: Option<i32>,
    pub last_error: Option<String>,
    pub document_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decree_url() {
        assert_eq!(
            decree_url("https://sgg.gouv.bj", 2024, 17),
            "https://sgg.gouv.bj/doc/decret-2024-17/download"
        );
        assert_eq!(
            decree_url("http://localhost:8080/", 2023, 1),
            "http://localhost:8080/doc/decret-2023-1/download"
        );
    }

    #[test]
    fn test_status_names() {
        for status in AttemptStatus::ALL {
            assert_eq!(AttemptStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(AttemptStatus::NotFound.to_string(), "not_found");
        assert_eq!(AttemptStatus::from_str("bogus"), None);
    }
}
