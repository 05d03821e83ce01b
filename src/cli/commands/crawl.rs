//! Ad hoc crawl over a range of years.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use clap::Args;
use console::style;

use crate::cli::helpers::{open_context, parse_bool, success};
use crate::config::{require_ocr_api_keys, Settings};
use crate::http_client::HttpClient;
use crate::ocr::{OcrExtractor, OcrOptions, OcrSpaceEngine, SplitLimits, OCR_TIMEOUT};
use crate::services::scanner::DEFAULT_CONCURRENCY;
use crate::services::{year_window, ScanParams, Scanner};

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// First year (default: current year)
    #[arg(long)]
    pub start_year: Option<i32>,
    /// Last year (default: current year)
    #[arg(long)]
    pub end_year: Option<i32>,
    /// Indices processed at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Only the last N years of the range (0 = all)
    #[arg(long, default_value_t = 0)]
    pub limit_years: u32,
    /// Stop a year after this many downloads (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub limit_per_year: u32,
    /// Consecutive misses that end a year
    #[arg(long, default_value_t = 100)]
    pub gap_limit: u32,
    /// User agent for archive requests (default: from settings)
    #[arg(long)]
    pub user_agent: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub start_index: i64,
    /// Last index (default: until the gap limit stops the year)
    #[arg(long)]
    pub end_index: Option<i64>,
    /// Archive request timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
    /// Probe with HEAD before each GET
    #[arg(
        long,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_value = "true",
        default_missing_value = "true",
        value_parser = parse_bool
    )]
    pub head_check: bool,
    /// OCR language code
    #[arg(long, default_value = "fre")]
    pub language: String,
    /// Largest payload sent in one OCR call, in KB
    #[arg(long, default_value_t = 1024)]
    pub max_ocr_kb: usize,
    #[arg(long, default_value_t = 3)]
    pub max_pages_per_call: usize,
}

impl CrawlArgs {
    fn scan_params(&self, base_url: &str) -> ScanParams {
        let this_year = Utc::now().year();
        let start_year = self.start_year.unwrap_or(this_year);
        let end_year = self.end_year.unwrap_or(this_year);

        ScanParams {
            years: year_window(start_year, end_year, Some(self.limit_years)),
            start_index: self.start_index,
            end_index: self.end_index,
            concurrency: self.concurrency,
            gap_limit: self.gap_limit,
            limit_per_year: Some(self.limit_per_year).filter(|n| *n > 0),
            head_check: self.head_check,
            ocr: OcrOptions {
                language: self.language.clone(),
                ..OcrOptions::default()
            },
            limits: SplitLimits::from_kb(self.max_ocr_kb, self.max_pages_per_call),
            base_url: base_url.to_string(),
        }
    }
}

pub async fn cmd_crawl(settings: &Settings, args: CrawlArgs) -> anyhow::Result<()> {
    let api_keys = require_ocr_api_keys()?;
    let ctx = open_context(settings).await?;
    let params = args.scan_params(&settings.base_url);

    let fetcher = HttpClient::builder(Duration::from_millis(args.timeout_ms))
        .user_agent(args.user_agent.as_deref().unwrap_or(&settings.user_agent))
        .request_delay(Duration::from_millis(settings.request_delay_ms))
        .build()?;
    let engine = OcrSpaceEngine::new(Some(settings.ocr_endpoint.as_str()), OCR_TIMEOUT)?;
    let scanner = Scanner::new(
        ctx,
        Arc::new(fetcher),
        Arc::new(OcrExtractor::new(Arc::new(engine))),
        api_keys,
    );

    println!(
        "{} Crawl {:?} (concurrency={}, gap limit={})",
        style("→").dim(),
        params.years,
        params.concurrency,
        params.gap_limit
    );
    let stats = scanner.scan(&params).await?;

    println!(
        "{} {} downloaded, {} not found, {} errors, {} skipped ({} attempted, {} in known ranges)",
        success(),
        style(stats.downloaded).green(),
        stats.not_found,
        style(stats.errors).red(),
        stats.skipped,
        stats.attempted,
        stats.skipped_known_not_found
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: CrawlArgs,
    }

    #[test]
    fn test_scan_params_from_flags() {
        let harness = Harness::try_parse_from([
            "crawl",
            "--start-year",
            "2018",
            "--end-year",
            "2021",
            "--limit-years",
            "2",
            "--limit-per-year",
            "4",
            "--end-index",
            "50",
            "--max-ocr-kb",
            "512",
        ])
        .unwrap();

        let params = harness.args.scan_params("https://archive.test");
        assert_eq!(params.years, vec![2020, 2021]);
        assert_eq!(params.limit_per_year, Some(4));
        assert_eq!(params.end_index, Some(50));
        assert_eq!(params.limits.max_bytes, 512 * 1024);
        assert!(params.head_check);
        assert_eq!(params.base_url, "https://archive.test");
    }

    #[test]
    fn test_zero_limits_mean_unbounded() {
        let harness = Harness::try_parse_from(["crawl", "--start-year", "2020", "--end-year", "2021"])
            .unwrap();
        let params = harness.args.scan_params("https://archive.test");
        assert_eq!(params.years, vec![2020, 2021]);
        assert_eq!(params.limit_per_year, None);
        assert_eq!(params.end_index, None);
    }
}
