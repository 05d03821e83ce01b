//! Periodic job configuration commands.

use console::style;
use serde_json::{Map, Value};

use crate::cli::helpers::{open_context, parse_json_value, success};
use crate::config::Settings;
use crate::jobs::config_json;
use crate::models::JobName;

/// Print a job's configuration merged over its defaults.
pub async fn cmd_config_get(settings: &Settings, name: JobName) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let (enabled, params) = config_json(&ctx, name).await?;
    let shown = serde_json::json!({ "name": name, "enabled": enabled, "params": params });
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

/// Merge one key into the stored parameters.
pub async fn cmd_config_set(
    settings: &Settings,
    name: JobName,
    key: &str,
    value: &str,
) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let value = parse_json_value(value);

    let (_, defaults) = config_json(&ctx, name).await?;
    if defaults.get(key).is_none() {
        println!(
            "{} {} has no parameter '{}'; storing it anyway",
            style("!").yellow(),
            name,
            key
        );
    }

    let mut patch = Map::new();
    patch.insert(key.to_string(), value.clone());
    ctx.job_configs().upsert(name.as_str(), None, &patch).await?;

    // Read back through the typed merge to report what will actually apply.
    let (_, merged) = config_json(&ctx, name).await?;
    match merged.get(key) {
        Some(applied) if *applied == value => {
            println!("{} {}.{} = {}", success(), name, key, applied)
        }
        Some(applied) => println!(
            "{} {}.{} stored but ignored (invalid type); effective value {}",
            style("!").yellow(),
            name,
            key,
            applied
        ),
        None => println!("{} {}.{} stored", success(), name, key),
    }
    Ok(())
}

pub async fn cmd_config_enable(settings: &Settings, name: JobName, enabled: bool) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    ctx.job_configs()
        .upsert(name.as_str(), Some(enabled), &Map::<String, Value>::new())
        .await?;
    let verb = if enabled { "Enabled" } else { "Disabled" };
    println!("{} {} {}", success(), verb, name);
    Ok(())
}
