//! "latest": scan a short window past the current year's highest index.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::params::{CrawlSettings, LatestParams};
use super::tuning::{tune_batch, RunObservation, TuningBounds};
use super::{load_config, JobReport, JobRunner, JobStatus};
use crate::models::JobName;
use crate::services::{RangeCompactor, ScanParams, DEFAULT_MAX_ROWS_PER_YEAR};

pub(super) fn scan_base(crawl: &CrawlSettings, base_url: &str) -> ScanParams {
    ScanParams {
        concurrency: crawl.concurrency,
        gap_limit: crawl.gap_limit,
        head_check: crawl.head_check,
        ocr: crawl.ocr_options(),
        limits: crawl.split_limits(),
        base_url: base_url.to_string(),
        ..ScanParams::default()
    }
}

pub(super) fn bounds(crawl: &CrawlSettings, floor: u32, ceiling: u32) -> TuningBounds {
    TuningBounds {
        floor,
        ceiling,
        fast_run_sec: crawl.fast_run_sec,
        slow_run_sec: crawl.slow_run_sec,
    }
}

impl JobRunner {
    pub(super) async fn run_latest(&self) -> anyhow::Result<JobReport> {
        let job = JobName::Latest;
        let config = load_config::<LatestParams>(&self.ctx, job).await?;
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
        let year = self.current_year();

        let scanner = self.scanner(Duration::from_millis(params.crawl.timeout_ms))?;
        let mut base = scan_base(&params.crawl, &self.settings.base_url);
        base.limit_per_year = Some(params.limit_per_year).filter(|n| *n > 0);
        let (scan, (from, to)) = self.scan_forward(&scanner, year, params.batch, base).await?;

        let compact = RangeCompactor::new(self.ctx.clone())
            .compact(&[year], DEFAULT_MAX_ROWS_PER_YEAR)
            .await?;

        let stats = scan.run_stats();
        let duration_sec = started.elapsed().as_secs_f64();
        let batch_before = params.batch;
        params.batch = tune_batch(
            params.batch,
            RunObservation {
                duration_sec,
                errors: stats.errors,
            },
            bounds(&params.crawl, params.min_batch, params.max_batch),
        );
        params.quiet_runs = if stats.downloaded == 0 {
            params.quiet_runs.saturating_add(1)
        } else {
            0
        };
        params.telemetry.record(Utc::now(), duration_sec, stats.errors);
        self.save_params(job, &params).await?;

        info!(
            "latest {}: window [{}-{}], batch {} -> {}, quiet runs {}",
            year, from, to, batch_before, params.batch, params.quiet_runs
        );
        let extra = json!({
            "year": year,
            "window": { "from": from, "to": to },
            "batch": { "from": batch_before, "to": params.batch },
            "quietRuns": params.quiet_runs,
            "skippedKnownNotFound": scan.skipped_known_not_found,
            "compact": compact,
        });
        self.record_run(job, started_at, started, stats, extra).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{archive_with, runner};
    use super::*;
    use crate::models::{decree_url, AttemptStatus};
    use crate::repository::test_support::setup_test_db;
    use crate::repository::RunLogQuery;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_latest_scans_window_and_compacts() {
        let (ctx, _dir) = setup_test_db().await;
        let archive = Arc::new(archive_with(&[(2026, 1), (2026, 2)]));

        let report = runner(&ctx, archive.clone()).run(JobName::Latest).await.unwrap();

        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.stats.downloaded, 2);
        // Window [1-13] stops after ten misses following index 2.
        assert_eq!(report.stats.not_found, 10);
        assert_eq!(report.extra["window"]["to"], 13);
        assert_eq!(report.extra["compact"]["rangesCreated"], 1);

        let ranges = ctx.ranges().for_year(2026).await.unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start_index, ranges[0].end_index), (3, 12));
        assert!(ctx
            .attempts()
            .get(&decree_url(super::super::testing::BASE, 2026, 3))
            .await
            .unwrap()
            .is_none());

        let config = load_config::<LatestParams>(&ctx, JobName::Latest).await.unwrap();
        assert_eq!(config.params.batch, 4);
        assert_eq!(config.params.quiet_runs, 0);
        assert!(config.params.telemetry.last_run_at.is_some());

        let logs = ctx
            .run_logs()
            .list(&RunLogQuery {
                name: Some("latest".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].stats.downloaded, 2);
    }

    #[tokio::test]
    async fn test_latest_resumes_after_highest_index_and_counts_quiet_runs() {
        let (ctx, _dir) = setup_test_db().await;
        let archive = Arc::new(archive_with(&[(2026, 1)]));
        let runner = runner(&ctx, archive.clone());

        runner.run(JobName::Latest).await.unwrap();
        let second = runner.run(JobName::Latest).await.unwrap();

        assert_eq!(second.extra["window"]["from"], 2);
        assert_eq!(second.stats.downloaded, 0);
        // Indices 2..=11 are a known range now.
        assert_eq!(second.stats.attempted, 0);
        assert_eq!(second.extra["skippedKnownNotFound"], 10);

        let config = load_config::<LatestParams>(&ctx, JobName::Latest).await.unwrap();
        assert_eq!(config.params.quiet_runs, 1);
        let attempt = ctx
            .attempts()
            .get(&decree_url(super::super::testing::BASE, 2026, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempt.status, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn test_latest_respects_limit_per_year() {
        let (ctx, _dir) = setup_test_db().await;
        let archive = Arc::new(archive_with(&[
            (2026, 1),
            (2026, 2),
            (2026, 3),
            (2026, 4),
            (2026, 5),
        ]));

        let report = runner(&ctx, archive).run(JobName::Latest).await.unwrap();
        assert_eq!(report.stats.downloaded, 3);
        assert_eq!(report.stats.attempted, 3);
    }

    #[tokio::test]
    async fn test_disabled_and_keyless_runs_do_nothing() {
        let (ctx, _dir) = setup_test_db().await;
        let archive = Arc::new(archive_with(&[(2026, 1)]));

        let keyless = JobRunner::new(ctx.clone(), Default::default(), Vec::new())
            .with_fetcher(archive.clone());
        let report = keyless.run(JobName::Latest).await.unwrap();
        assert_eq!(report.status, JobStatus::Skipped);
        assert!(report.reason.is_some());

        ctx.job_configs()
            .upsert("latest", Some(false), &serde_json::Map::new())
            .await
            .unwrap();
        let report = runner(&ctx, archive.clone()).run(JobName::Latest).await.unwrap();
        assert_eq!(report.status, JobStatus::Disabled);
        assert_eq!(archive.get_count(), 0);
        assert!(ctx
            .run_logs()
            .list(&RunLogQuery::default())
            .await
            .unwrap()
            .is_empty());
    }
}
