//! Run log listing and aggregates.

use chrono::{DateTime, Utc};
use console::style;

use crate::cli::helpers::{open_context, warning};
use crate::config::Settings;
use crate::models::JobName;
use crate::repository::RunLogQuery;

pub async fn cmd_runs(
    settings: &Settings,
    name: Option<JobName>,
    since: Option<DateTime<Utc>>,
    limit: usize,
    aggregate: bool,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let query = RunLogQuery {
        name: name.map(|n| n.as_str().to_string()),
        since,
        limit: Some(limit),
    };
    let run_logs = ctx.run_logs();

    if aggregate {
        let agg = run_logs.aggregate(&query).await?;
        println!("{:<18} {}", "Runs:", agg.count);
        if let Some(avg) = agg.avg_duration_sec {
            println!("{:<18} {:.1}s", "Avg duration:", avg);
        }
        if let Some(avg) = agg.avg_errors {
            println!("{:<18} {:.2}", "Avg errors:", avg);
        }
        let t = agg.totals;
        println!(
            "{:<18} {} attempted, {} downloaded, {} not found, {} errors, {} skipped",
            "Totals:", t.attempted, t.downloaded, t.not_found, t.errors, t.skipped
        );
        return Ok(());
    }

    let logs = run_logs.list(&query).await?;
    if logs.is_empty() {
        println!("{} No runs recorded", warning());
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{:<20} {:<9} {:>8} {:>6} {:>6} {:>6} {:>6} {:>6}",
            "Started", "Job", "Secs", "Tried", "New", "404", "Err", "Skip"
        ))
        .bold()
    );
    for log in logs {
        let s = log.stats;
        let errors = if s.errors > 0 {
            style(s.errors.to_string()).red()
        } else {
            style(s.errors.to_string())
        };
        println!(
            "{:<20} {:<9} {:>8.1} {:>6} {:>6} {:>6} {:>6} {:>6}",
            log.started_at.format("%Y-%m-%d %H:%M:%S"),
            log.name,
            log.duration_sec,
            s.attempted,
            s.downloaded,
            s.not_found,
            errors,
            s.skipped
        );
    }
    Ok(())
}
