//! Not-found range repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::NotFoundRangeRecord;
use super::pool::{DbError, DbPool};
use super::{now_rfc3339, parse_datetime};
use crate::models::NotFoundRange;
use crate::schema::not_found_ranges;
use crate::with_conn;

impl From<NotFoundRangeRecord> for NotFoundRange {
    fn from(record: NotFoundRangeRecord) -> Self {
        NotFoundRange {
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
            id: record.id,
            year: record.year,
            start_index: record.start_index,
            end_index: record.end_index,
            count: record.count,
        }
    }
}

#[derive(Clone)]
pub struct NotFoundRangeRepository {
    pool: DbPool,
}

impl NotFoundRangeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All ranges of a year, ordered by start index.
    pub async fn for_year(&self, year: i32) -> Result<Vec<NotFoundRange>, DbError> {
        with_conn!(self.pool, conn => {
            not_found_ranges::table
                .filter(not_found_ranges::year.eq(year))
                .order(not_found_ranges::start_index.asc())
                .load::<NotFoundRangeRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(NotFoundRange::from).collect())
        })
    }

    /// Ranges of a year that overlap `[start, end]` or are adjacent to it.
    pub async fn touching(
        &self,
        year: i32,
        start: i64,
        end: i64,
    ) -> Result<Vec<NotFoundRange>, DbError> {
        with_conn!(self.pool, conn => {
            not_found_ranges::table
                .filter(not_found_ranges::year.eq(year))
                .filter(not_found_ranges::start_index.le(end + 1))
                .filter(not_found_ranges::end_index.ge(start - 1))
                .order(not_found_ranges::start_index.asc())
                .load::<NotFoundRangeRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(NotFoundRange::from).collect())
        })
    }

    pub async fn create(&self, year: i32, start: i64, end: i64) -> Result<NotFoundRange, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let count = end - start + 1;

        with_conn!(self.pool, conn => {
            diesel::insert_into(not_found_ranges::table)
                .values((
                    not_found_ranges::id.eq(&id),
                    not_found_ranges::year.eq(year),
                    not_found_ranges::start_index.eq(start),
                    not_found_ranges::end_index.eq(end),
                    not_found_ranges::count.eq(count),
                    not_found_ranges::created_at.eq(&now),
                    not_found_ranges::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
            Ok::<(), DbError>(())
        })?;

        let now = parse_datetime(&now);
        Ok(NotFoundRange {
            id,
            year,
            start_index: start,
            end_index: end,
            count,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move a range's bounds; the count is recomputed from them.
    pub async fn set_bounds(&self, id: &str, start: i64, end: i64) -> Result<usize, DbError> {
        let now = now_rfc3339();
        with_conn!(self.pool, conn => {
            diesel::update(not_found_ranges::table.find(id))
                .set((
                    not_found_ranges::start_index.eq(start),
                    not_found_ranges::end_index.eq(end),
                    not_found_ranges::count.eq(end - start + 1),
                    not_found_ranges::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await
        })
    }

    pub async fn delete_many(&self, ids: &[String]) -> Result<usize, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }
        with_conn!(self.pool, conn => {
            diesel::delete(not_found_ranges::table.filter(not_found_ranges::id.eq_any(ids)))
                .execute(&mut conn)
                .await
        })
    }

    /// Number of ranges and the positions they cover.
    pub async fn summary(&self) -> Result<(i64, i64), DbError> {
        with_conn!(self.pool, conn => {
            let counts: Vec<i64> = not_found_ranges::table
                .select(not_found_ranges::count)
                .load(&mut conn)
                .await?;
            Ok((counts.len() as i64, counts.iter().sum()))
        })
    }
}
