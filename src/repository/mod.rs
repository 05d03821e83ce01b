//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM. Supports both SQLite and PostgreSQL
//! backends through [`DbPool`].

pub mod context;
pub mod crawl;
pub mod diesel_models;
pub mod document;
pub mod filter;
pub mod job_config;
pub mod pool;
pub mod range;
pub mod run_log;
pub mod util;

pub use context::DbContext;
pub use crawl::{AttemptOutcome, CrawlAttemptRepository};
pub use document::{DocumentCursor, DocumentPage, DocumentRepository};
pub use filter::FilterRepository;
pub use job_config::{JobConfigRepository, StoredJobConfig};
pub use pool::{DbError, DbPool};
pub use range::NotFoundRangeRepository;
pub use run_log::{RunLogQuery, RunLogRepository, DEFAULT_RUN_LOG_RETENTION};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Current time formatted for storage.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Shared SQLite fixture for repository and service tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::{DbContext, DbPool};
    use tempfile::TempDir;

    pub async fn setup_test_db() -> (DbContext, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = DbContext::new(DbPool::sqlite_file(&dir.path().join("test.db")));
        ctx.init_schema().await.expect("schema");
        (ctx, dir)
    }
}
