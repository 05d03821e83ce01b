//! Append-only run log with per-job retention.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{NewRunLog, RunLogRecord};
use super::parse_datetime;
use super::pool::{DbError, DbPool};
use crate::models::{RunAggregate, RunLog, RunStats};
use crate::schema::run_logs;
use crate::with_conn;

impl From<RunLogRecord> for RunLog {
    fn from(record: RunLogRecord) -> Self {
        RunLog {
            started_at: parse_datetime(&record.started_at),
            extra: serde_json::from_str(&record.extra).unwrap_or(serde_json::Value::Null),
            stats: RunStats {
                attempted: record.attempted,
                downloaded: record.downloaded,
                not_found: record.not_found,
                errors: record.errors,
                skipped: record.skipped,
            },
            id: record.id,
            name: record.name,
            duration_sec: record.duration_sec,
        }
    }
}

/// Logs kept per job when no positive retention is configured.
pub const DEFAULT_RUN_LOG_RETENTION: usize = 5;

/// Filter for reading run logs.
#[derive(Debug, Clone, Default)]
pub struct RunLogQuery {
    pub name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct RunLogRepository {
    pool: DbPool,
}

impl RunLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, log: &RunLog) -> Result<(), DbError> {
        let started_at = log.started_at.to_rfc3339();
        let extra = log.extra.to_string();
        with_conn!(self.pool, conn => {
            diesel::insert_into(run_logs::table)
                .values(NewRunLog {
                    id: &log.id,
                    name: &log.name,
                    started_at: &started_at,
                    duration_sec: log.duration_sec,
                    attempted: log.stats.attempted,
                    downloaded: log.stats.downloaded,
                    not_found: log.stats.not_found,
                    errors: log.stats.errors,
                    skipped: log.stats.skipped,
                    extra: &extra,
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Keep only the `keep` most recent logs of a job. Returns rows deleted.
    /// Delete all but the `keep` most recent logs of `name`; zero means the default.
    pub async fn prune(&self, name: &str, keep: usize) -> Result<usize, DbError> {
        let keep = if keep == 0 { DEFAULT_RUN_LOG_RETENTION } else { keep };
        let keep = keep as i64;
        with_conn!(self.pool, conn => {
            let stale: Vec<String> = run_logs::table
                .filter(run_logs::name.eq(name))
                .order((run_logs::started_at.desc(), run_logs::id.desc()))
                .offset(keep)
                .limit(i64::MAX)
                .select(run_logs::id)
                .load(&mut conn)
                .await?;

            if stale.is_empty() {
                return Ok(0);
            }
            diesel::delete(run_logs::table.filter(run_logs::id.eq_any(&stale)))
                .execute(&mut conn)
                .await
        })
    }

    /// Most recent first.
    pub async fn list(&self, query: &RunLogQuery) -> Result<Vec<RunLog>, DbError> {
        let since = query.since.map(|dt| dt.to_rfc3339()).unwrap_or_default();
        let limit = query.limit.map(|l| l as i64).unwrap_or(i64::MAX);

        let records: Vec<RunLogRecord> = with_conn!(self.pool, conn => {
            match &query.name {
                Some(name) => {
                    run_logs::table
                        .filter(run_logs::name.eq(name))
                        .filter(run_logs::started_at.ge(&since))
                        .order(run_logs::started_at.desc())
                        .limit(limit)
                        .load::<RunLogRecord>(&mut conn)
                        .await?
                }
                None => {
                    run_logs::table
                        .filter(run_logs::started_at.ge(&since))
                        .order(run_logs::started_at.desc())
                        .limit(limit)
                        .load::<RunLogRecord>(&mut conn)
                        .await?
                }
            }
        });
        Ok(records.into_iter().map(RunLog::from).collect())
    }

    /// Count, averages and counter sums over the logs matching `query`.
    ///
    /// The query's `limit` is ignored: aggregates cover every matching row.
    pub async fn aggregate(&self, query: &RunLogQuery) -> Result<RunAggregate, DbError> {
        let unbounded = RunLogQuery {
            limit: None,
            ..query.clone()
        };
        let logs = self.list(&unbounded).await?;
        Ok(aggregate_logs(&logs))
    }
}

fn aggregate_logs(logs: &[RunLog]) -> RunAggregate {
    let mut aggregate = RunAggregate {
        count: logs.len() as i64,
        ..Default::default()
    };
    if logs.is_empty() {
        return aggregate;
    }

    let mut duration = 0.0;
    for log in logs {
        duration += log.duration_sec;
        aggregate.totals.add(&log.stats);
    }
    let n = logs.len() as f64;
    aggregate.avg_duration_sec = Some(duration / n);
    aggregate.avg_errors = Some(aggregate.totals.errors as f64 / n);
    aggregate
}
