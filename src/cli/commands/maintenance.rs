//! Compaction, budget enforcement and reconciliation commands.

use console::style;

use crate::cli::helpers::{format_bytes, open_context, success};
use crate::config::Settings;
use crate::jobs::{load_config, PurgeParams};
use crate::models::JobName;
use crate::services::{BudgetEnforcer, RangeCompactor};

pub async fn cmd_compact(settings: &Settings, years: &[i32], max_rows: usize) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let compactor = RangeCompactor::new(ctx);
    let stats = if years.is_empty() {
        compactor.compact_all(max_rows).await?
    } else {
        compactor.compact(years, max_rows).await?
    };

    println!(
        "{} {} ranges created, {} extended, {} attempt rows folded",
        success(),
        stats.ranges_created,
        stats.ranges_extended,
        stats.rows_deleted
    );
    Ok(())
}

/// Enforce the budget once, defaulting to the purge job's parameters.
pub async fn cmd_purge(
    settings: &Settings,
    max_bytes: Option<i64>,
    max_deletes: Option<usize>,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let params = load_config::<PurgeParams>(&ctx, JobName::Purge).await?.params;
    let max_bytes = max_bytes.unwrap_or(params.max_bytes);
    let max_deletes = max_deletes.unwrap_or(params.max_deletes_per_run as usize);

    let stats = BudgetEnforcer::new(ctx).enforce(max_bytes, max_deletes).await?;
    println!(
        "{} Deleted {} documents, freed {}; {} stored (budget {})",
        success(),
        stats.deleted,
        format_bytes(stats.freed_bytes),
        style(format_bytes(stats.total_after)).bold(),
        format_bytes(max_bytes)
    );
    Ok(())
}

pub async fn cmd_reconcile(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let fixed = ctx.attempts().reconcile_with_documents().await?;
    println!("{} {} attempts marked successful", success(), fixed);
    Ok(())
}
