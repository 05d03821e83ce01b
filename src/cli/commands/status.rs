//! System status overview.

use console::style;

use crate::cli::helpers::{format_bytes, open_context};
use crate::config::{ocr_api_keys, Settings};
use crate::jobs::{load_config, PurgeParams};
use crate::models::{AttemptStatus, JobName};
use crate::repository::util::redact_url_password;

pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;

    let totals = ctx.documents().totals().await?;
    let budget = load_config::<PurgeParams>(&ctx, JobName::Purge)
        .await?
        .params
        .max_bytes;
    let attempts = ctx.attempts().count_by_status().await?;
    let (range_count, covered) = ctx.ranges().summary().await?;

    println!("\n{}", style("Decree Harvester Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<22} {}", "Database:", redact_url_password(&settings.database_url));
    println!("{:<22} {}", "Archive:", settings.base_url);
    println!("{:<22} {}", "OCR keys:", ocr_api_keys().len());

    println!("\n{}", style("Storage").bold());
    println!("{:<22} {}", "Documents:", totals.documents);
    let used = format!("{} / {}", format_bytes(totals.bytes), format_bytes(budget));
    if totals.bytes > budget {
        println!("{:<22} {}", "Stored:", style(used).red());
    } else {
        println!("{:<22} {}", "Stored:", style(used).green());
    }

    println!("\n{}", style("Crawl attempts").bold());
    for status in AttemptStatus::ALL {
        let count = attempts.get(status.as_str()).copied().unwrap_or(0);
        println!("{:<22} {}", format!("{}:", status.as_str()), count);
    }
    println!(
        "{:<22} {} ({} indices)",
        "Not-found ranges:", range_count, covered
    );

    println!("\n{}", style("Jobs").bold());
    for job in JobName::ALL {
        let (enabled, params) = crate::jobs::config_json(&ctx, job).await?;
        let last_run = params
            .get("lastRunAt")
            .and_then(|v| v.as_str())
            .unwrap_or("never");
        let state = if enabled {
            style("enabled").green()
        } else {
            style("disabled").dim()
        };
        println!("{:<22} {} (last run {})", format!("{}:", job), state, last_run);
    }
    Ok(())
}
