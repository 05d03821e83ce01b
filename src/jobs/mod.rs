//! Periodic jobs: latest, backfill and purge.
//!
//! Each run loads its typed parameters (stored bag merged over defaults),
//! does nothing when disabled, performs its work, tunes its batch size from
//! what it observed, writes the parameters back, appends a run log and
//! prunes older logs.

mod backfill;
mod latest;
pub mod params;
mod purge;
pub mod tuning;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Datelike, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::http_client::{DocumentFetcher, HttpClient};
use crate::models::{JobName, RunLog, RunStats};
use crate::ocr::{OcrExtractor, OcrSpaceEngine, TextExtractor, OCR_TIMEOUT};
use crate::repository::DbContext;
use crate::services::{ScanParams, Scanner};

pub use params::{merge_over_defaults, BackfillParams, LatestParams, PurgeParams};

/// How a job invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    /// The job is disabled in its configuration.
    Disabled,
    /// Preconditions unmet (no OCR key); nothing was attempted.
    Skipped,
    /// Backfill waiting for enough quiet "latest" runs.
    Waiting,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Disabled => "disabled",
            Self::Skipped => "skipped",
            Self::Waiting => "waiting",
        }
    }
}

/// Outcome reported to whoever triggered the job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: JobName,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub stats: RunStats,
    pub duration_sec: f64,
    pub extra: Value,
}

impl JobReport {
    fn idle(job: JobName, status: JobStatus, reason: Option<String>) -> Self {
        Self {
            job,
            status,
            reason,
            stats: RunStats::default(),
            duration_sec: 0.0,
            extra: Value::Null,
        }
    }
}

/// Merged configuration of one job.
#[derive(Debug, Clone)]
pub struct JobConfig<T> {
    pub enabled: bool,
    pub params: T,
}

/// Read a job's configuration, merged over the defaults of `T`.
pub async fn load_config<T>(ctx: &DbContext, job: JobName) -> anyhow::Result<JobConfig<T>>
where
    T: Default + Serialize + DeserializeOwned,
{
    let stored = ctx
        .job_configs()
        .get(job.as_str())
        .await
        .with_context(|| format!("loading {job} configuration"))?;
    Ok(match stored {
        Some(stored) => JobConfig {
            enabled: stored.enabled,
            params: merge_over_defaults(&stored.params),
        },
        None => JobConfig {
            enabled: true,
            params: T::default(),
        },
    })
}

/// Merged configuration of any job as JSON, for display.
pub async fn config_json(ctx: &DbContext, job: JobName) -> anyhow::Result<(bool, Value)> {
    fn render<T: Serialize>(config: JobConfig<T>) -> anyhow::Result<(bool, Value)> {
        Ok((config.enabled, serde_json::to_value(&config.params)?))
    }
    match job {
        JobName::Latest => render(load_config::<LatestParams>(ctx, job).await?),
        JobName::Backfill => render(load_config::<BackfillParams>(ctx, job).await?),
        JobName::Purge => render(load_config::<PurgeParams>(ctx, job).await?),
    }
}

/// Runs the periodic jobs against one database.
pub struct JobRunner {
    ctx: DbContext,
    settings: Settings,
    api_keys: Vec<String>,
    fetcher: Option<Arc<dyn DocumentFetcher>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    year: Option<i32>,
}

impl JobRunner {
    pub fn new(ctx: DbContext, settings: Settings, api_keys: Vec<String>) -> Self {
        Self {
            ctx,
            settings,
            api_keys,
            fetcher: None,
            extractor: None,
            year: None,
        }
    }

    /// Use `fetcher` instead of an HTTP client built per run.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use `extractor` instead of the OCR.space extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Pretend the current year is `year`.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub async fn run(&self, job: JobName) -> anyhow::Result<JobReport> {
        info!("Running job {}", job);
        match job {
            JobName::Latest => self.run_latest().await,
            JobName::Backfill => self.run_backfill().await,
            JobName::Purge => self.run_purge().await,
        }
    }

    fn current_year(&self) -> i32 {
        self.year.unwrap_or_else(|| Utc::now().year())
    }

    fn missing_keys(&self, job: JobName) -> Option<JobReport> {
        if !self.api_keys.is_empty() {
            return None;
        }
        info!("Job {} skipped: no OCR API key", job);
        Some(JobReport::idle(
            job,
            JobStatus::Skipped,
            Some("no OCR API key configured".to_string()),
        ))
    }

    fn scanner(&self, timeout: Duration) -> anyhow::Result<Scanner> {
        let fetcher: Arc<dyn DocumentFetcher> = match &self.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => Arc::new(
                HttpClient::builder(timeout)
                    .user_agent(&self.settings.user_agent)
                    .request_delay(Duration::from_millis(self.settings.request_delay_ms))
                    .build()?,
            ),
        };
        let extractor: Arc<dyn TextExtractor> = match &self.extractor {
            Some(extractor) => extractor.clone(),
            None => Arc::new(OcrExtractor::new(Arc::new(OcrSpaceEngine::new(
                Some(self.settings.ocr_endpoint.as_str()),
                OCR_TIMEOUT,
            )?))),
        };
        Ok(Scanner::new(
            self.ctx.clone(),
            fetcher,
            extractor,
            self.api_keys.clone(),
        ))
    }

    /// Scan one year from just past its highest stored index.
    async fn scan_forward(
        &self,
        scanner: &Scanner,
        year: i32,
        batch: u32,
        base: ScanParams,
    ) -> anyhow::Result<(crate::services::ScanStats, (i64, i64))> {
        let start = self
            .ctx
            .documents()
            .max_index_for_year(year)
            .await?
            .map_or(1, |max| max + 1);
        let end = start + i64::from(batch) + i64::from(base.gap_limit) - 1;
        debug!("{}: scanning window [{}-{}]", year, start, end);

        let params = ScanParams {
            years: vec![year],
            start_index: start,
            end_index: Some(end),
            ..base
        };
        Ok((scanner.scan(&params).await?, (start, end)))
    }

    async fn save_params<T: Serialize>(&self, job: JobName, params: &T) -> anyhow::Result<()> {
        let patch: Map<String, Value> = params::to_patch(params);
        self.ctx
            .job_configs()
            .upsert(job.as_str(), None, &patch)
            .await
            .with_context(|| format!("saving {job} parameters"))?;
        Ok(())
    }

    /// Append a run log and prune the job's history to the retention count.
    async fn record_run(
        &self,
        job: JobName,
        started_at: DateTime<Utc>,
        started: Instant,
        stats: RunStats,
        extra: Value,
    ) -> anyhow::Result<JobReport> {
        let duration_sec = started.elapsed().as_secs_f64();
        let log = RunLog {
            id: uuid::Uuid::new_v4().to_string(),
            name: job.as_str().to_string(),
            started_at,
            duration_sec,
            stats,
            extra: extra.clone(),
        };
        let run_logs = self.ctx.run_logs();
        run_logs
            .insert(&log)
            .await
            .with_context(|| format!("writing {job} run log"))?;
        let pruned = run_logs
            .prune(job.as_str(), self.settings.run_log_retention)
            .await?;
        debug!("Pruned {} old {} run logs", pruned, job);

        Ok(JobReport {
            job,
            status: JobStatus::Completed,
            reason: None,
            stats,
            duration_sec,
            extra,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::JobRunner;
    use crate::config::Settings;
    use crate::http_client::{DocumentFetcher, FetchError, FetchedBody};
    use crate::models::decree_url;
    use crate::ocr::{ExtractedText, OcrError, OcrOptions, SplitLimits, TextExtractor};
    use crate::repository::DbContext;

    pub const BASE: &str = "http://archive.test";

    /// Serves the listed decrees; everything else is 404.
    #[derive(Default)]
    pub struct FakeArchive {
        pages: HashMap<String, Vec<u8>>,
        gets: AtomicUsize,
    }

    impl FakeArchive {
        pub fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentFetcher for FakeArchive {
        async fn head_status(&self, url: &str) -> Result<u16, FetchError> {
            Ok(if self.pages.contains_key(url) { 200 } else { 404 })
        }

        async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(match self.pages.get(url) {
                Some(body) => FetchedBody {
                    status: 200,
                    body: body.clone(),
                },
                None => FetchedBody {
                    status: 404,
                    body: Vec::new(),
                },
            })
        }
    }

    pub fn archive_with(decrees: &[(i32, i64)]) -> FakeArchive {
        let pages = decrees
            .iter()
            .map(|&(year, index)| {
                (
                    decree_url(BASE, year, index),
                    format!("Décret {year}-{index}").into_bytes(),
                )
            })
            .collect();
        FakeArchive {
            pages,
            gets: AtomicUsize::new(0),
        }
    }

    pub struct EchoExtractor;

    #[async_trait]
    impl TextExtractor for EchoExtractor {
        async fn extract(
            &self,
            pdf: &[u8],
            _api_keys: &[String],
            options: &OcrOptions,
            _limits: SplitLimits,
        ) -> Result<ExtractedText, OcrError> {
            Ok(ExtractedText {
                text: String::from_utf8_lossy(pdf).to_string(),
                provider: "echo".to_string(),
                engine: options.engine,
            })
        }
    }

    /// Runner pinned to 2026 over `archive`, with one OCR key.
    pub fn runner(ctx: &DbContext, archive: Arc<FakeArchive>) -> JobRunner {
        let settings = Settings {
            base_url: BASE.to_string(),
            ..Settings::default()
        };
        JobRunner::new(ctx.clone(), settings, vec!["key".to_string()])
            .with_fetcher(archive)
            .with_extractor(Arc::new(EchoExtractor))
            .with_year(2026)
    }
}
