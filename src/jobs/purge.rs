//! "purge": keep stored PDF bytes under the configured budget.

use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::params::PurgeParams;
use super::tuning::tune_delete_batch;
use super::{load_config, JobReport, JobRunner, JobStatus};
use crate::models::{JobName, RunStats};
use crate::services::BudgetEnforcer;

impl JobRunner {
    pub(super) async fn run_purge(&self) -> anyhow::Result<JobReport> {
        let job = JobName::Purge;
        let config = load_config::<PurgeParams>(&self.ctx, job).await?;
        if !config.enabled {
            info!("Job {} disabled", job);
            return Ok(JobReport::idle(job, JobStatus::Disabled, None));
        }

        let mut params = config.params;
        let started_at = Utc::now();
        let started = Instant::now();

        let total_before = self.ctx.documents().totals().await?.bytes;
        let batch_before = params.max_deletes_per_run;
        params.max_deletes_per_run = tune_delete_batch(
            params.max_deletes_per_run,
            total_before,
            params.max_bytes,
            params.min_deletes_per_run,
            params.max_deletes_ceiling,
        );

        let purge = BudgetEnforcer::new(self.ctx.clone())
            .enforce(params.max_bytes, params.max_deletes_per_run as usize)
            .await?;

        let duration_sec = started.elapsed().as_secs_f64();
        params.telemetry.record(Utc::now(), duration_sec, 0);
        self.save_params(job, &params).await?;

        info!(
            "purge: {} bytes before, budget {}, delete batch {} -> {}",
            total_before, params.max_bytes, batch_before, params.max_deletes_per_run
        );
        let extra = json!({
            "totalBefore": total_before,
            "maxBytes": params.max_bytes,
            "maxDeletesPerRun": { "from": batch_before, "to": params.max_deletes_per_run },
            "purge": purge,
        });
        self.record_run(job, started_at, started, RunStats::default(), extra)
            .await
    }
}
