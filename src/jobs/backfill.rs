//! "backfill": walk prior years forward once "latest" has gone quiet.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::latest::{bounds, scan_base};
use super::params::{BackfillParams, LatestParams};
use super::tuning::{tune_batch, RunObservation};
use super::{load_config, JobReport, JobRunner, JobStatus};
use crate::models::{JobName, RunStats};
use crate::services::{RangeCompactor, DEFAULT_MAX_ROWS_PER_YEAR};

impl JobRunner {
    pub(super) async fn run_backfill(&self) -> anyhow::Result<JobReport> {
        let job = JobName::Backfill;
        let config = load_config::<BackfillParams>(&self.ctx, job).await?;
        if !config.enabled {
            info!("Job {} disabled", job);
            return Ok(JobReport::idle(job, JobStatus::Disabled, None));
        }
        if let Some(report) = self.missing_keys(job) {
            return Ok(report);
        }

        let mut params = config.params;
        let started_at = Utc::now();
        let started = Instant::now();

        let latest = load_config::<LatestParams>(&self.ctx, JobName::Latest).await?;
        let quiet_runs = latest.params.quiet_runs;
        if quiet_runs < params.need_quiet_runs {
            info!(
                "backfill waiting: {} of {} quiet latest runs",
                quiet_runs, params.need_quiet_runs
            );
            let extra = json!({
                "gated": true,
                "quietRuns": quiet_runs,
                "needQuietRuns": params.need_quiet_runs,
            });
            let mut report = self
                .record_run(job, started_at, started, RunStats::default(), extra)
                .await?;
            report.status = JobStatus::Waiting;
            return Ok(report);
        }

        let scanner = self.scanner(Duration::from_millis(params.crawl.timeout_ms))?;
        let current = self.current_year();
        let years: Vec<i32> = (1..=params.years_count as i32).map(|n| current - n).collect();

        let mut stats = RunStats::default();
        let mut windows = Vec::with_capacity(years.len());
        for &year in &years {
            let mut base = scan_base(&params.crawl, &self.settings.base_url);
            base.limit_per_year = Some(params.batch_per_year).filter(|n| *n > 0);
            let (scan, (from, to)) = self
                .scan_forward(&scanner, year, params.batch_per_year, base)
                .await?;
            stats.add(&scan.run_stats());
            windows.push(json!({ "year": year, "from": from, "to": to }));
        }

        let compact = RangeCompactor::new(self.ctx.clone())
            .compact(&years, DEFAULT_MAX_ROWS_PER_YEAR)
            .await?;

        let duration_sec = started.elapsed().as_secs_f64();
        let batch_before = params.batch_per_year;
        params.batch_per_year = tune_batch(
            params.batch_per_year,
            RunObservation {
                duration_sec,
                errors: stats.errors,
            },
            bounds(&params.crawl, params.min_batch, params.max_batch),
        );
        params.telemetry.record(Utc::now(), duration_sec, stats.errors);
        self.save_params(job, &params).await?;

        info!(
            "backfill {:?}: batch per year {} -> {}",
            years, batch_before, params.batch_per_year
        );
        let extra = json!({
            "years": years,
            "windows": windows,
            "batchPerYear": { "from": batch_before, "to": params.batch_per_year },
            "compact": compact,
        });
        self.record_run(job, started_at, started, stats, extra).await
    }
}
