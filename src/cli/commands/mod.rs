//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod crawl;
mod filters;
mod init;
mod job;
mod maintenance;
mod runs;
mod status;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use super::helpers::strip_unknown_crawl_flags;
use crate::config::Settings;
use crate::models::{FilterField, FilterMode, FilterType, JobName};
use crate::services::DEFAULT_MAX_ROWS_PER_YEAR;

pub use crawl::CrawlArgs;

#[derive(Parser)]
#[command(name = "decrees")]
#[command(about = "Decree PDF harvester: probe, OCR and store published decrees")]
#[command(version)]
pub struct Cli {
    /// Settings file (TOML); defaults to ./decrees.toml
    #[arg(short, long, global = true, env = "DECREES_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Scan a range of years and indices for decrees
    Crawl(CrawlArgs),

    /// Run one periodic job now
    Job {
        /// latest, backfill or purge
        #[arg(value_parser = parse_job)]
        name: JobName,
    },

    /// Fold not_found attempts into not-found ranges
    Compact {
        /// Years to compact (default: every year with not_found rows)
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,
        /// Rows consumed per year
        #[arg(long, default_value_t = DEFAULT_MAX_ROWS_PER_YEAR)]
        max_rows: usize,
    },

    /// Delete old documents until storage fits the budget
    Purge {
        /// Budget in bytes (default: the purge job's maxBytes)
        #[arg(long)]
        max_bytes: Option<i64>,
        /// Deletion cap (default: the purge job's maxDeletesPerRun)
        #[arg(long)]
        max_deletes: Option<usize>,
    },

    /// Mark attempts whose document exists as successful
    Reconcile,

    /// Show storage, attempt and range statistics
    Status,

    /// Show recent job runs
    Runs {
        /// Only this job
        #[arg(long, value_parser = parse_job)]
        name: Option<JobName>,
        /// Only runs started at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<chrono::DateTime<chrono::Utc>>,
        /// Maximum runs listed
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Print aggregates instead of individual runs
        #[arg(short, long)]
        aggregate: bool,
    },

    /// Manage exclusion and protection rules
    Filters {
        #[command(subcommand)]
        command: FilterCommands,
    },

    /// Inspect and change periodic job configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum FilterCommands {
    /// List all rules
    List,
    /// Add a rule
    Add {
        /// exclude, include or protect
        #[arg(value_parser = parse_filter_type)]
        rule_type: FilterType,
        /// title, text, url, tag or category
        #[arg(value_parser = parse_filter_field)]
        field: FilterField,
        pattern: String,
        /// contains, startsWith, endsWith or regex
        #[arg(short, long, default_value = "contains", value_parser = parse_filter_mode)]
        mode: FilterMode,
    },
    /// Delete a rule
    Remove { id: String },
    /// Re-activate a rule
    Enable { id: String },
    /// Deactivate a rule without deleting it
    Disable { id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show a job's merged configuration
    Get {
        #[arg(value_parser = parse_job)]
        name: JobName,
    },
    /// Set one parameter (value parsed as JSON, else taken as a string)
    Set {
        #[arg(value_parser = parse_job)]
        name: JobName,
        key: String,
        value: String,
    },
    /// Enable a job
    Enable {
        #[arg(value_parser = parse_job)]
        name: JobName,
    },
    /// Disable a job
    Disable {
        #[arg(value_parser = parse_job)]
        name: JobName,
    },
}

fn parse_job(s: &str) -> Result<JobName, String> {
    JobName::from_str(s).ok_or_else(|| format!("unknown job '{s}' (latest, backfill, purge)"))
}

fn parse_filter_type(s: &str) -> Result<FilterType, String> {
    FilterType::from_str(s).ok_or_else(|| format!("unknown rule type '{s}'"))
}

fn parse_filter_field(s: &str) -> Result<FilterField, String> {
    FilterField::from_str(s).ok_or_else(|| format!("unknown field '{s}'"))
}

fn parse_filter_mode(s: &str) -> Result<FilterMode, String> {
    FilterMode::from_str(s).ok_or_else(|| format!("unknown mode '{s}'"))
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_from(strip_unknown_crawl_flags(std::env::args().collect()));
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Crawl(args) => crawl::cmd_crawl(&settings, args).await,
        Commands::Job { name } => job::cmd_job(&settings, name).await,
        Commands::Compact { years, max_rows } => {
            maintenance::cmd_compact(&settings, &years, max_rows).await
        }
        Commands::Purge {
            max_bytes,
            max_deletes,
        } => maintenance::cmd_purge(&settings, max_bytes, max_deletes).await,
        Commands::Reconcile => maintenance::cmd_reconcile(&settings).await,
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Runs {
            name,
            since,
            limit,
            aggregate,
        } => runs::cmd_runs(&settings, name, since, limit, aggregate).await,
        Commands::Filters { command } => match command {
            FilterCommands::List => filters::cmd_filters_list(&settings).await,
            FilterCommands::Add {
                rule_type,
                field,
                pattern,
                mode,
            } => filters::cmd_filters_add(&settings, rule_type, field, mode, &pattern).await,
            FilterCommands::Remove { id } => filters::cmd_filters_remove(&settings, &id).await,
            FilterCommands::Enable { id } => {
                filters::cmd_filters_set_active(&settings, &id, true).await
            }
            FilterCommands::Disable { id } => {
                filters::cmd_filters_set_active(&settings, &id, false).await
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Get { name } => config_cmd::cmd_config_get(&settings, name).await,
            ConfigCommands::Set { name, key, value } => {
                config_cmd::cmd_config_set(&settings, name, &key, &value).await
            }
            ConfigCommands::Enable { name } => {
                config_cmd::cmd_config_enable(&settings, name, true).await
            }
            ConfigCommands::Disable { name } => {
                config_cmd::cmd_config_enable(&settings, name, false).await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_crawl_flags_parse() {
        let cli = Cli::try_parse_from([
            "decrees",
            "crawl",
            "--start-year",
            "2020",
            "--end-year",
            "2022",
            "--limit-years",
            "2",
            "--head-check",
            "false",
            "--gap-limit",
            "7",
        ])
        .unwrap();
        let Commands::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        assert_eq!(args.start_year, Some(2020));
        assert_eq!(args.limit_years, 2);
        assert!(!args.head_check);
        assert_eq!(args.gap_limit, 7);
        assert_eq!(args.concurrency, 5);
        assert_eq!(args.language, "fre");
    }

    #[test]
    fn test_bare_head_check_means_true() {
        let cli = Cli::try_parse_from(["decrees", "crawl", "--head-check", "--language", "eng"])
            .unwrap();
        let Commands::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        assert!(args.head_check);
        assert_eq!(args.language, "eng");
    }

    #[test]
    fn test_job_names() {
        let cli = Cli::try_parse_from(["decrees", "job", "backfill"]).unwrap();
        assert!(matches!(cli.command, Commands::Job { name: JobName::Backfill }));
        assert!(Cli::try_parse_from(["decrees", "job", "weekly"]).is_err());
    }
}
