//! Filter rule management.

use console::style;

use crate::cli::helpers::{open_context, success, warning};
use crate::config::Settings;
use crate::models::{FilterField, FilterMode, FilterRule, FilterType};

pub async fn cmd_filters_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    let rules = ctx.filters().list().await?;
    if rules.is_empty() {
        println!("{} No filter rules", warning());
        return Ok(());
    }

    for rule in rules {
        let state = if rule.active {
            style("active").green()
        } else {
            style("inactive").dim()
        };
        println!(
            "{}  {:<8} {:<9} {:<10} {:?}  {}",
            style(&rule.id).dim(),
            rule.rule_type.as_str(),
            rule.field.as_str(),
            rule.mode.as_str(),
            rule.pattern,
            state
        );
    }
    Ok(())
}

pub async fn cmd_filters_add(
    settings: &Settings,
    rule_type: FilterType,
    field: FilterField,
    mode: FilterMode,
    pattern: &str,
) -> anyhow::Result<()> {
    if mode == FilterMode::Regex {
        regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid regex '{}': {}", pattern, e))?;
    }
    if rule_type == FilterType::Include {
        println!("{} include rules are recorded but have no effect", warning());
    }

    let ctx = open_context(settings).await?;
    let rule = FilterRule::new(rule_type, field, mode, pattern);
    ctx.filters().create(&rule).await?;
    println!("{} Added rule {}", success(), rule.id);
    Ok(())
}

pub async fn cmd_filters_remove(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    if ctx.filters().delete(id).await? == 0 {
        anyhow::bail!("No filter rule with id {}", id);
    }
    println!("{} Removed rule {}", success(), id);
    Ok(())
}

pub async fn cmd_filters_set_active(settings: &Settings, id: &str, active: bool) -> anyhow::Result<()> {
    let ctx = open_context(settings).await?;
    if ctx.filters().set_active(id, active).await? == 0 {
        anyhow::bail!("No filter rule with id {}", id);
    }
    let verb = if active { "Enabled" } else { "Disabled" };
    println!("{} {} rule {}", success(), verb, id);
    Ok(())
}
