//! Shared helper functions for CLI commands.

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::repository::util::redact_url_password;
use crate::repository::DbContext;

/// Long flags the ad hoc crawl understands; anything else is dropped.
pub const CRAWL_FLAGS: &[&str] = &[
    "start-year",
    "end-year",
    "concurrency",
    "limit-years",
    "limit-per-year",
    "gap-limit",
    "user-agent",
    "start-index",
    "end-index",
    "timeout-ms",
    "head-check",
    "language",
    "max-ocr-kb",
    "max-pages-per-call",
    "config",
    "verbose",
    "help",
];

/// Open the configured database and make sure the schema exists.
pub async fn open_context(settings: &Settings) -> anyhow::Result<DbContext> {
    let url = redact_url_password(&settings.database_url);
    let ctx = DbContext::from_url(&settings.database_url)
        .with_context(|| format!("opening database {url}"))?;
    ctx.init_schema()
        .await
        .with_context(|| format!("creating schema in {url}"))?;
    Ok(ctx)
}

/// Drop long flags that `crawl` doesn't know, with their value if detached.
///
/// Arguments before the `crawl` subcommand are left untouched.
pub fn strip_unknown_crawl_flags(args: Vec<String>) -> Vec<String> {
    let Some(pos) = args
        .iter()
        .enumerate()
        .skip(1)
        .position(|(i, arg)| arg == "crawl" && !matches!(args[i - 1].as_str(), "-c" | "--config"))
        .map(|p| p + 1)
    else {
        return args;
    };

    let mut kept: Vec<String> = args[..=pos].to_vec();
    let mut rest = args[pos + 1..].iter().peekable();
    while let Some(arg) = rest.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            kept.push(arg.clone());
            continue;
        };
        let (name, inline_value) = match flag.split_once('=') {
            Some((name, _)) => (name, true),
            None => (flag, false),
        };
        if CRAWL_FLAGS.contains(&name) {
            kept.push(arg.clone());
            continue;
        }
        tracing::debug!("Ignoring unknown crawl flag --{}", name);
        if !inline_value && rest.peek().is_some_and(|next| !next.starts_with('-')) {
            rest.next();
        }
    }
    kept
}

/// Lenient boolean for flags such as `--head-check false`.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

/// Parse a CLI value as JSON, falling back to a plain string.
pub fn parse_json_value(value: &str) -> serde_json::Value {
    serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}

/// Format bytes as human-readable size.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

pub fn success() -> console::StyledObject<&'static str> {
    style("✓").green()
}

pub fn warning() -> console::StyledObject<&'static str> {
    style("!").yellow()
}
