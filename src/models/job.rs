//! Periodic job identities and run logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The periodic jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    Latest,
    Backfill,
    Purge,
}

impl JobName {
    pub const ALL: [JobName; 3] = [JobName::Latest, JobName::Backfill, JobName::Purge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Backfill => "backfill",
            Self::Purge => "purge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "latest" => Some(Self::Latest),
            "backfill" => Some(Self::Backfill),
            "purge" => Some(Self::Purge),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters shared by crawl results and run logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub attempted: i64,
    pub downloaded: i64,
    pub not_found: i64,
    pub errors: i64,
    pub skipped: i64,
}

impl RunStats {
    pub fn add(&mut self, other: &RunStats) {
        self.attempted += other.attempted;
        self.downloaded += other.downloaded;
        self.not_found += other.not_found;
        self.errors += other.errors;
        self.skipped += other.skipped;
    }
}

/// One recorded job invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLog {
    pub id: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_sec: f64,
    #[serde(flatten)]
    pub stats: RunStats,
    /// Free-form payload such as tuning decisions.
    pub extra: serde_json::Value,
}

/// Aggregate over a set of run logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregate {
    pub count: i64,
    pub avg_duration_sec: Option<f64>,
    pub avg_errors: Option<f64>,
    pub totals: RunStats,
}
