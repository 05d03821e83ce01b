//! Crawl attempt repository.
//!
//! One row per decree URL. Rows are upserted on every probe and removed once
//! a not_found row has been folded into a [`NotFoundRange`](crate::models::NotFoundRange).

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::CrawlAttemptRecord;
use super::pool::{DbError, DbPool};
use super::{now_rfc3339, parse_datetime, parse_datetime_opt};
use crate::models::{AttemptStatus, CrawlAttempt};
use crate::schema::{crawl_attempts, documents};
use crate::with_conn;

impl From<CrawlAttemptRecord> for CrawlAttempt {
    fn from(record: CrawlAttemptRecord) -> Self {
        CrawlAttempt {
            status: AttemptStatus::from_str(&record.status).unwrap_or(AttemptStatus::Pending),
            last_visited_at: parse_datetime_opt(record.last_visited_at.as_deref()),
            updated_at: parse_datetime(&record.updated_at),
            url: record.url,
            year: record.year,
            index: record.doc_index,
            attempts: record.attempts,
            http_status: record.http_status,
            last_error: record.last_error,
            document_id: record.document_id,
        }
    }
}

/// Terminal outcome written back after a probe.
#[derive(Debug, Clone, Default)]
pub struct AttemptOutcome<'a> {
    pub http_status: Option<i32>,
    pub error: Option<&'a str>,
    pub document_id: Option<&'a str>,
}

#[derive(Clone)]
pub struct CrawlAttemptRepository {
    pool: DbPool,
}

impl CrawlAttemptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, url: &str) -> Result<Option<CrawlAttempt>, DbError> {
        with_conn!(self.pool, conn => {
            crawl_attempts::table
                .find(url)
                .first::<CrawlAttemptRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(CrawlAttempt::from))
        })
    }

    /// Record the start of an attempt: status becomes `pending` and the
    /// attempt counter is bumped. Creates the row on first sight.
    pub async fn begin_attempt(&self, url: &str, year: i32, index: i64) -> Result<(), DbError> {
        let now = now_rfc3339();
        let pending = AttemptStatus::Pending.as_str();

        with_conn!(self.pool, conn => {
            let updated = diesel::update(crawl_attempts::table.find(url))
                .set((
                    crawl_attempts::status.eq(pending),
                    crawl_attempts::attempts.eq(crawl_attempts::attempts + 1),
                    crawl_attempts::last_visited_at.eq(Some(now.as_str())),
                    crawl_attempts::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;

            if updated == 0 {
                diesel::insert_into(crawl_attempts::table)
                    .values((
                        crawl_attempts::url.eq(url),
                        crawl_attempts::year.eq(year),
                        crawl_attempts::doc_index.eq(index),
                        crawl_attempts::status.eq(pending),
                        crawl_attempts::attempts.eq(1),
                        crawl_attempts::last_visited_at.eq(Some(now.as_str())),
                        crawl_attempts::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            Ok(())
        })
    }

    /// Write the result of an attempt.
    pub async fn finish_attempt(
        &self,
        url: &str,
        year: i32,
        index: i64,
        status: AttemptStatus,
        outcome: AttemptOutcome<'_>,
    ) -> Result<(), DbError> {
        let now = now_rfc3339();
        let status = status.as_str();

        with_conn!(self.pool, conn => {
            let updated = diesel::update(crawl_attempts::table.find(url))
                .set((
                    crawl_attempts::status.eq(status),
                    crawl_attempts::http_status.eq(outcome.http_status),
                    crawl_attempts::last_error.eq(outcome.error),
                    crawl_attempts::document_id.eq(outcome.document_id),
                    crawl_attempts::last_visited_at.eq(Some(now.as_str())),
                    crawl_attempts::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;

            if updated == 0 {
                diesel::insert_into(crawl_attempts::table)
                    .values((
                        crawl_attempts::url.eq(url),
                        crawl_attempts::year.eq(year),
                        crawl_attempts::doc_index.eq(index),
                        crawl_attempts::status.eq(status),
                        crawl_attempts::attempts.eq(1),
                        crawl_attempts::http_status.eq(outcome.http_status),
                        crawl_attempts::last_error.eq(outcome.error),
                        crawl_attempts::document_id.eq(outcome.document_id),
                        crawl_attempts::last_visited_at.eq(Some(now.as_str())),
                        crawl_attempts::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            Ok(())
        })
    }

    /// Oldest-index-first not_found rows of a year.
    pub async fn not_found_for_year(
        &self,
        year: i32,
        limit: usize,
    ) -> Result<Vec<CrawlAttempt>, DbError> {
        let limit = limit as i64;
        with_conn!(self.pool, conn => {
            crawl_attempts::table
                .filter(crawl_attempts::year.eq(year))
                .filter(crawl_attempts::status.eq(AttemptStatus::NotFound.as_str()))
                .order(crawl_attempts::doc_index.asc())
                .limit(limit)
                .load::<CrawlAttemptRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(CrawlAttempt::from).collect())
        })
    }

    /// Years that still have uncompacted not_found rows.
    pub async fn years_with_not_found(&self) -> Result<Vec<i32>, DbError> {
        with_conn!(self.pool, conn => {
            crawl_attempts::table
                .filter(crawl_attempts::status.eq(AttemptStatus::NotFound.as_str()))
                .select(crawl_attempts::year)
                .distinct()
                .order(crawl_attempts::year.desc())
                .load::<i32>(&mut conn)
                .await
        })
    }

    pub async fn delete_many(&self, urls: &[String]) -> Result<usize, DbError> {
        if urls.is_empty() {
            return Ok(0);
        }
        with_conn!(self.pool, conn => {
            diesel::delete(crawl_attempts::table.filter(crawl_attempts::url.eq_any(urls)))
                .execute(&mut conn)
                .await
        })
    }

    /// Null out links to a document about to be deleted.
    pub async fn detach_document(&self, document_id: &str) -> Result<usize, DbError> {
        let now = now_rfc3339();
        with_conn!(self.pool, conn => {
            diesel::update(
                crawl_attempts::table.filter(crawl_attempts::document_id.eq(document_id)),
            )
            .set((
                crawl_attempts::document_id.eq(None::<String>),
                crawl_attempts::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await
        })
    }

    /// Mark attempts `success` where a document already exists for the URL
    /// but the attempt row never caught up.
    ///
    /// Returns the number of rows repaired.
    pub async fn reconcile_with_documents(&self) -> Result<usize, DbError> {
        let now = now_rfc3339();
        let success = AttemptStatus::Success.as_str();

        with_conn!(self.pool, conn => {
            let stale: Vec<(String, String)> = documents::table
                .filter(
                    documents::url.eq_any(
                        crawl_attempts::table
                            .filter(crawl_attempts::status.ne(success))
                            .select(crawl_attempts::url),
                    ),
                )
                .select((documents::url, documents::id))
                .load(&mut conn)
                .await?;

            let mut repaired = 0;
            for (url, document_id) in &stale {
                repaired += diesel::update(crawl_attempts::table.find(url))
                    .set((
                        crawl_attempts::status.eq(success),
                        crawl_attempts::document_id.eq(Some(document_id.as_str())),
                        crawl_attempts::last_error.eq(None::<String>),
                        crawl_attempts::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            Ok(repaired)
        })
    }

    /// Row counts per status.
    pub async fn count_by_status(&self) -> Result<HashMap<String, i64>, DbError> {
        use diesel::dsl::count_star;
        with_conn!(self.pool, conn => {
            let rows: Vec<(String, i64)> = crawl_attempts::table
                .group_by(crawl_attempts::status)
                .select((crawl_attempts::status, count_star()))
                .load(&mut conn)
                .await?;
            Ok(rows.into_iter().collect())
        })
    }
}
