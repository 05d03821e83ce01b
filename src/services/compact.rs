//! Folds not_found attempt rows into not-found ranges.

use serde::Serialize;
use tracing::{debug, info};

use crate::models::CrawlAttempt;
use crate::repository::{DbContext, DbError};

pub const DEFAULT_MAX_ROWS_PER_YEAR: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactStats {
    pub ranges_created: i64,
    pub ranges_extended: i64,
    pub rows_deleted: i64,
}

/// A maximal run of consecutive indices and the attempt rows behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRun {
    pub start: i64,
    pub end: i64,
    pub urls: Vec<String>,
}

/// Group index-sorted attempts into maximal consecutive runs.
pub fn consecutive_runs(attempts: &[CrawlAttempt]) -> Vec<IndexRun> {
    let mut runs: Vec<IndexRun> = Vec::new();
    for attempt in attempts {
        match runs.last_mut() {
            Some(run) if attempt.index <= run.end + 1 => {
                run.end = run.end.max(attempt.index);
                run.urls.push(attempt.url.clone());
            }
            _ => runs.push(IndexRun {
                start: attempt.index,
                end: attempt.index,
                urls: vec![attempt.url.clone()],
            }),
        }
    }
    runs
}

pub struct RangeCompactor {
    ctx: DbContext,
}

impl RangeCompactor {
    pub fn new(ctx: DbContext) -> Self {
        Self { ctx }
    }

    /// Compact up to `max_rows_per_year` not_found rows of each year.
    ///
    /// A run that overlaps or touches existing ranges is merged into the
    /// first of them and the others are removed, so a year's ranges stay
    /// disjoint and non-adjacent.
    pub async fn compact(
        &self,
        years: &[i32],
        max_rows_per_year: usize,
    ) -> Result<CompactStats, DbError> {
        let attempts = self.ctx.attempts();
        let ranges = self.ctx.ranges();
        let mut stats = CompactStats::default();

        for &year in years {
            let rows = attempts.not_found_for_year(year, max_rows_per_year).await?;
            if rows.is_empty() {
                continue;
            }

            for run in consecutive_runs(&rows) {
                let touching = ranges.touching(year, run.start, run.end).await?;
                match touching.split_first() {
                    None => {
                        ranges.create(year, run.start, run.end).await?;
                        stats.ranges_created += 1;
                        debug!("{}: new range [{}-{}]", year, run.start, run.end);
                    }
                    Some((first, rest)) => {
                        let start = touching
                            .iter()
                            .map(|r| r.start_index)
                            .fold(run.start, i64::min);
                        let end = touching.iter().map(|r| r.end_index).fold(run.end, i64::max);
                        ranges.set_bounds(&first.id, start, end).await?;
                        let merged: Vec<String> = rest.iter().map(|r| r.id.clone()).collect();
                        ranges.delete_many(&merged).await?;
                        stats.ranges_extended += 1;
                        debug!(
                            "{}: range {} now [{}-{}] ({} merged)",
                            year,
                            first.id,
                            start,
                            end,
                            merged.len()
                        );
                    }
                }
                stats.rows_deleted += attempts.delete_many(&run.urls).await? as i64;
            }
        }

        info!(
            "Compaction: {} ranges created, {} extended, {} rows deleted",
            stats.ranges_created, stats.ranges_extended, stats.rows_deleted
        );
        Ok(stats)
    }

    /// Compact every year that still has not_found rows.
    pub async fn compact_all(&self, max_rows_per_year: usize) -> Result<CompactStats, DbError> {
        let years = self.ctx.attempts().years_with_not_found().await?;
        self.compact(&years, max_rows_per_year).await
    }
}
