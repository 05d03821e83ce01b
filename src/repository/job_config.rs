//! Named job configuration blobs.
//!
//! Parameters are stored as a JSON object. Writes are shallow merges: keys in
//! the patch replace stored keys, other stored keys are kept.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde_json::{Map, Value};

use super::diesel_models::JobConfigRecord;
use super::pool::{DbError, DbPool};
use super::util::store_error;
use super::{now_rfc3339, parse_datetime};
use crate::schema::job_configs;
use crate::with_conn;

/// Raw stored configuration for a job.
#[derive(Debug, Clone)]
pub struct StoredJobConfig {
    pub enabled: bool,
    pub params: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobConfigRecord> for StoredJobConfig {
    fn from(record: JobConfigRecord) -> Self {
        let params = match serde_json::from_str::<Value>(&record.params) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        StoredJobConfig {
            enabled: record.enabled != 0,
            params,
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Shallow merge of `patch` into `base`.
pub fn merge_params(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        base.insert(key.clone(), value.clone());
    }
}

#[derive(Clone)]
pub struct JobConfigRepository {
    pool: DbPool,
}

impl JobConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, name: &str) -> Result<Option<StoredJobConfig>, DbError> {
        with_conn!(self.pool, conn => {
            job_configs::table
                .find(name)
                .first::<JobConfigRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(StoredJobConfig::from))
        })
    }

    /// Merge `patch` into the stored params and optionally flip `enabled`.
    ///
    /// A job without a stored row starts enabled with empty params.
    pub async fn upsert(
        &self,
        name: &str,
        enabled: Option<bool>,
        patch: &Map<String, Value>,
    ) -> Result<StoredJobConfig, DbError> {
        let current = self.get(name).await?;
        let (mut params, was_enabled) = match current {
            Some(stored) => (stored.params, stored.enabled),
            None => (Map::new(), true),
        };
        merge_params(&mut params, patch);
        let enabled = enabled.unwrap_or(was_enabled);

        let now = now_rfc3339();
        let serialized =
            serde_json::to_string(&Value::Object(params.clone())).map_err(store_error)?;

        with_conn!(self.pool, conn => {
            let updated = diesel::update(job_configs::table.find(name))
                .set((
                    job_configs::enabled.eq(enabled as i32),
                    job_configs::params.eq(&serialized),
                    job_configs::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;

            if updated == 0 {
                diesel::insert_into(job_configs::table)
                    .values((
                        job_configs::name.eq(name),
                        job_configs::enabled.eq(enabled as i32),
                        job_configs::params.eq(&serialized),
                        job_configs::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            Ok::<(), DbError>(())
        })?;

        Ok(StoredJobConfig {
            enabled,
            params,
            updated_at: parse_datetime(&now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_upsert_merges_shallowly() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.job_configs();

        assert!(repo.get("latest").await.unwrap().is_none());

        repo.upsert("latest", None, &obj(json!({"batch": 5, "language": "fre"})))
            .await
            .unwrap();
        repo.upsert("latest", Some(false), &obj(json!({"batch": 7})))
            .await
            .unwrap();

        let stored = repo.get("latest").await.unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.params.get("batch"), Some(&json!(7)));
        assert_eq!(stored.params.get("language"), Some(&json!("fre")));
    }

    #[test]
    fn test_merge_params_replaces_nested_values_whole() {
        let mut base = obj(json!({"a": {"x": 1, "y": 2}, "b": 1}));
        merge_params(&mut base, &obj(json!({"a": {"x": 3}})));
        assert_eq!(Value::Object(base), json!({"a": {"x": 3}, "b": 1}));
    }
}
