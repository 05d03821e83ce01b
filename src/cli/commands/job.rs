//! Run a periodic job on demand.

use console::style;

use crate::cli::helpers::{open_context, success, warning};
use crate::config::{ocr_api_keys, Settings};
use crate::jobs::{JobRunner, JobStatus};
use crate::models::JobName;

pub async fn cmd_job(settings: &Settings, name: JobName) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let runner = JobRunner::new(ctx, settings.clone(), ocr_api_keys());
    let report = runner.run(name).await?;

    let marker = match report.status {
        JobStatus::Completed => success(),
        JobStatus::Disabled | JobStatus::Skipped | JobStatus::Waiting => warning(),
    };
    println!(
        "{} {} {}{}",
        marker,
        style(report.job).bold(),
        report.status.as_str(),
        report
            .reason
            .as_deref()
            .map(|r| format!(": {r}"))
            .unwrap_or_default()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
