//! Filter rule repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{FilterRuleRecord, NewFilterRule};
use super::parse_datetime;
use super::pool::{DbError, DbPool};
use super::util::store_error;
use crate::models::{FilterField, FilterMode, FilterRule, FilterType};
use crate::schema::filter_rules;
use crate::with_conn;

impl TryFrom<FilterRuleRecord> for FilterRule {
    type Error = DbError;

    fn try_from(record: FilterRuleRecord) -> Result<Self, Self::Error> {
        let rule_type = FilterType::from_str(&record.rule_type)
            .ok_or_else(|| store_error(format!("unknown filter type: {}", record.rule_type)))?;
        let field = FilterField::from_str(&record.field)
            .ok_or_else(|| store_error(format!("unknown filter field: {}", record.field)))?;
        let mode = FilterMode::from_str(&record.mode)
            .ok_or_else(|| store_error(format!("unknown filter mode: {}", record.mode)))?;

        Ok(FilterRule {
            id: record.id,
            rule_type,
            field,
            mode,
            pattern: record.pattern,
            active: record.active != 0,
            created_at: parse_datetime(&record.created_at),
        })
    }
}

fn into_rules(records: Vec<FilterRuleRecord>) -> Result<Vec<FilterRule>, DbError> {
    records.into_iter().map(FilterRule::try_from).collect()
}

#[derive(Clone)]
pub struct FilterRepository {
    pool: DbPool,
}

impl FilterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, rule: &FilterRule) -> Result<(), DbError> {
        let created_at = rule.created_at.to_rfc3339();
        with_conn!(self.pool, conn => {
            diesel::insert_into(filter_rules::table)
                .values(NewFilterRule {
                    id: &rule.id,
                    rule_type: rule.rule_type.as_str(),
                    field: rule.field.as_str(),
                    mode: rule.mode.as_str(),
                    pattern: &rule.pattern,
                    active: rule.active as i32,
                    created_at: &created_at,
                })
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    pub async fn list(&self) -> Result<Vec<FilterRule>, DbError> {
        let records: Vec<FilterRuleRecord> = with_conn!(self.pool, conn => {
            filter_rules::table
                .order(filter_rules::created_at.asc())
                .load::<FilterRuleRecord>(&mut conn)
                .await?
        });
        into_rules(records)
    }

    /// Active rules of one type.
    pub async fn active(&self, rule_type: FilterType) -> Result<Vec<FilterRule>, DbError> {
        let records: Vec<FilterRuleRecord> = with_conn!(self.pool, conn => {
            filter_rules::table
                .filter(filter_rules::rule_type.eq(rule_type.as_str()))
                .filter(filter_rules::active.eq(1))
                .order(filter_rules::created_at.asc())
                .load::<FilterRuleRecord>(&mut conn)
                .await?
        });
        into_rules(records)
    }

    pub async fn set_active(&self, id: &str, active: bool) -> Result<usize, DbError> {
        with_conn!(self.pool, conn => {
            diesel::update(filter_rules::table.find(id))
                .set(filter_rules::active.eq(active as i32))
                .execute(&mut conn)
                .await
        })
    }

    pub async fn delete(&self, id: &str) -> Result<usize, DbError> {
        with_conn!(self.pool, conn => {
            diesel::delete(filter_rules::table.find(id))
                .execute(&mut conn)
                .await
        })
    }
}
