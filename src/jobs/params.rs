//! Typed parameter sets of the periodic jobs.
//!
//! Stored parameter bags are JSON objects with camelCase keys. Reading merges
//! the stored keys over the defaults one key at a time, so a stored value of
//! the wrong type only loses that key.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::ocr::{OcrOptions, SplitLimits};

/// Smoothing factor of the exponential moving averages.
pub const EMA_ALPHA: f64 = 0.3;

/// Telemetry written back after every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_duration_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema_errors: Option<f64>,
}

impl RunTelemetry {
    pub fn record(&mut self, finished_at: DateTime<Utc>, duration_sec: f64, errors: i64) {
        self.last_run_at = Some(finished_at);
        self.ema_duration_sec = Some(super::tuning::ema(self.ema_duration_sec, duration_sec, EMA_ALPHA));
        self.ema_errors = Some(super::tuning::ema(self.ema_errors, errors as f64, EMA_ALPHA));
    }
}

/// Scan settings shared by the crawling jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrawlSettings {
    pub concurrency: usize,
    pub gap_limit: u32,
    pub timeout_ms: u64,
    pub head_check: bool,
    pub language: String,
    #[serde(rename = "maxOcrKB")]
    pub max_ocr_kb: usize,
    pub max_pages_per_call: usize,
    /// Runs shorter than this (and error free) grow the batch.
    pub fast_run_sec: f64,
    /// Runs longer than this (or with errors) shrink the batch.
    pub slow_run_sec: f64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            gap_limit: 10,
            timeout_ms: 8000,
            head_check: true,
            language: "fre".to_string(),
            max_ocr_kb: 1024,
            max_pages_per_call: 3,
            fast_run_sec: 10.0,
            slow_run_sec: 25.0,
        }
    }
}

impl CrawlSettings {
    pub fn ocr_options(&self) -> OcrOptions {
        OcrOptions {
            language: self.language.clone(),
            ..OcrOptions::default()
        }
    }

    pub fn split_limits(&self) -> SplitLimits {
        SplitLimits::from_kb(self.max_ocr_kb, self.max_pages_per_call)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LatestParams {
    pub batch: u32,
    pub min_batch: u32,
    pub max_batch: u32,
    /// 0 disables the per-year limit.
    pub limit_per_year: u32,
    /// Consecutive runs that downloaded nothing.
    pub quiet_runs: u32,
    #[serde(flatten)]
    pub crawl: CrawlSettings,
    #[serde(flatten)]
    pub telemetry: RunTelemetry,
}

impl Default for LatestParams {
    fn default() -> Self {
        Self {
            batch: 3,
            min_batch: 1,
            max_batch: 20,
            limit_per_year: 3,
            quiet_runs: 0,
            crawl: CrawlSettings::default(),
            telemetry: RunTelemetry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackfillParams {
    /// Prior years covered (1 = last year only).
    pub years_count: u32,
    pub batch_per_year: u32,
    pub min_batch: u32,
    pub max_batch: u32,
    /// Quiet "latest" runs required before backfill proceeds.
    pub need_quiet_runs: u32,
    #[serde(flatten)]
    pub crawl: CrawlSettings,
    #[serde(flatten)]
    pub telemetry: RunTelemetry,
}

impl Default for BackfillParams {
    fn default() -> Self {
        Self {
            years_count: 2,
            batch_per_year: 3,
            min_batch: 1,
            max_batch: 20,
            need_quiet_runs: 4,
            crawl: CrawlSettings {
                gap_limit: 20,
                ..CrawlSettings::default()
            },
            telemetry: RunTelemetry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PurgeParams {
    pub max_bytes: i64,
    pub max_deletes_per_run: u32,
    pub min_deletes_per_run: u32,
    pub max_deletes_ceiling: u32,
    #[serde(flatten)]
    pub telemetry: RunTelemetry,
}

impl Default for PurgeParams {
    fn default() -> Self {
        Self {
            max_bytes: 512 * 1024 * 1024,
            max_deletes_per_run: 100,
            min_deletes_per_run: 10,
            max_deletes_ceiling: 1000,
            telemetry: RunTelemetry::default(),
        }
    }
}

/// Merge `stored` over the defaults of `T`.
///
/// Unknown keys are ignored; a key whose value doesn't fit its field is
/// dropped with a warning.
pub fn merge_over_defaults<T>(stored: &Map<String, Value>) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let defaults = T::default();
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
        return defaults;
    };

    for (key, value) in stored {
        let previous = merged.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            warn!("Ignoring stored job parameter {}={}", key, value);
            match previous {
                Some(previous) => merged.insert(key.clone(), previous),
                None => merged.remove(key),
            };
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}

/// Serialize params into a patch object for a shallow-merge write.
pub fn to_patch<T: Serialize>(params: &T) -> Map<String, Value> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults_serialize_camel_case() {
        let patch = to_patch(&LatestParams::default());
        assert_eq!(patch.get("batch"), Some(&json!(3)));
        assert_eq!(patch.get("gapLimit"), Some(&json!(10)));
        assert_eq!(patch.get("maxOcrKB"), Some(&json!(1024)));
        assert_eq!(patch.get("headCheck"), Some(&json!(true)));
        assert!(patch.get("lastRunAt").is_none());

        let backfill = to_patch(&BackfillParams::default());
        assert_eq!(backfill.get("gapLimit"), Some(&json!(20)));
        assert_eq!(backfill.get("needQuietRuns"), Some(&json!(4)));

        let purge = to_patch(&PurgeParams::default());
        assert_eq!(purge.get("maxBytes"), Some(&json!(536_870_912)));
    }

    #[test]
    fn test_merge_keeps_defaults_for_missing_and_bad_keys() {
        let stored = obj(json!({
            "batch": 7,
            "language": "eng",
            "gapLimit": "lots",
            "legacyKey": true,
            "emaDurationSec": 4.5
        }));
        let params: LatestParams = merge_over_defaults(&stored);

        assert_eq!(params.batch, 7);
        assert_eq!(params.crawl.language, "eng");
        assert_eq!(params.crawl.gap_limit, 10);
        assert_eq!(params.limit_per_year, 3);
        assert_eq!(params.telemetry.ema_duration_sec, Some(4.5));
    }

    #[test]
    fn test_round_trip_through_patch() {
        let mut params = BackfillParams::default();
        params.batch_per_year = 9;
        params.telemetry.record(Utc::now(), 3.0, 1);

        let restored: BackfillParams = merge_over_defaults(&to_patch(&params));
        assert_eq!(restored, params);
    }
}
