//! Gap-limited scanner over the (year, index) decree space.
//!
//! Each year is walked in ascending index order by one coordinating loop.
//! Per-index work (probe, download, OCR, persistence) runs as futures in an
//! ordered queue, each holding a permit of a scan-wide semaphore, and their
//! outcomes are folded back in index order. The miss streak and the per-year
//! success count only change during that fold, so stopping decisions are
//! the ones a one-at-a-time walk would make: an index is dispatched only when
//! no combination of pending outcomes could have stopped the year before it.

use std::sync::Arc;

use futures::stream::{FuturesOrdered, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::filters::{Candidate, ExclusionPolicy};
use crate::http_client::{probe, DocumentFetcher, Probe};
use crate::models::{decree_url, AttemptStatus, NewDocumentData, NotFoundRange, RunStats};
use crate::ocr::{OcrOptions, SplitLimits, TextExtractor};
use crate::repository::{AttemptOutcome, DbContext};

/// In-flight queue size at which the coordinator drains everything.
pub const FLUSH_EVERY: usize = 200;

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone)]
pub struct ScanParams {
    /// Years in scan order.
    pub years: Vec<i32>,
    /// First index of the window (1-based).
    pub start_index: i64,
    /// Last index of the window; `None` scans until the gap limit stops it.
    pub end_index: Option<i64>,
    pub concurrency: usize,
    /// Consecutive misses (probed or known) that end a year.
    pub gap_limit: u32,
    /// Successful downloads that end a year.
    pub limit_per_year: Option<u32>,
    pub head_check: bool,
    pub ocr: OcrOptions,
    pub limits: SplitLimits,
    pub base_url: String,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            years: Vec::new(),
            start_index: 1,
            end_index: None,
            concurrency: DEFAULT_CONCURRENCY,
            gap_limit: 100,
            limit_per_year: None,
            head_check: true,
            ocr: OcrOptions::default(),
            limits: SplitLimits::default(),
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Years to scan: `start..=end`, or only the last `limit_years` of them.
pub fn year_window(start_year: i32, end_year: i32, limit_years: Option<u32>) -> Vec<i32> {
    match limit_years.filter(|n| *n > 0) {
        Some(n) => ((end_year - n as i32 + 1)..=end_year).collect(),
        None => (start_year..=end_year).collect(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub attempted: i64,
    pub downloaded: i64,
    pub not_found: i64,
    pub errors: i64,
    /// Already stored, excluded, or inside a known not-found range.
    pub skipped: i64,
    /// The part of `skipped` covered by known not-found ranges.
    pub skipped_known_not_found: i64,
}

impl ScanStats {
    pub fn run_stats(&self) -> RunStats {
        RunStats {
            attempted: self.attempted,
            downloaded: self.downloaded,
            not_found: self.not_found,
            errors: self.errors,
            skipped: self.skipped,
        }
    }
}

/// Result of the work for one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// A document already exists (or the attempt already succeeded).
    AlreadyDone,
    NotFound,
    Excluded,
    Downloaded,
    Failed,
}

enum Entry {
    Jump(i64),
    Unit(i64),
}

enum Settled {
    Jump(i64),
    Unit(UnitOutcome),
}

/// Loop-local state of one year.
#[derive(Default)]
struct YearState {
    streak: i64,
    found: i64,
    /// Misses the queued entries would add if every unit came back absent.
    pending_misses: i64,
    /// Queued units still unsettled.
    pending_units: i64,
}

impl YearState {
    fn may_continue(&self, params: &ScanParams) -> bool {
        let within_gap = self.streak + self.pending_misses < i64::from(params.gap_limit);
        let within_limit = params
            .limit_per_year
            .map_or(true, |limit| self.found + self.pending_units < i64::from(limit));
        within_gap && within_limit
    }

    fn fold(&mut self, settled: Settled, stats: &mut ScanStats) {
        match settled {
            Settled::Jump(n) => {
                self.pending_misses -= n;
                self.streak += n;
            }
            Settled::Unit(outcome) => {
                self.pending_misses -= 1;
                self.pending_units -= 1;
                match outcome {
                    UnitOutcome::Downloaded => {
                        self.found += 1;
                        self.streak = 0;
                        stats.downloaded += 1;
                    }
                    UnitOutcome::NotFound => {
                        self.streak += 1;
                        stats.not_found += 1;
                    }
                    UnitOutcome::AlreadyDone | UnitOutcome::Excluded => stats.skipped += 1,
                    UnitOutcome::Failed => stats.errors += 1,
                }
            }
        }
    }
}

/// Drives probing, OCR and persistence for index windows.
pub struct Scanner {
    ctx: DbContext,
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<dyn TextExtractor>,
    api_keys: Vec<String>,
}

impl Scanner {
    pub fn new(
        ctx: DbContext,
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<dyn TextExtractor>,
        api_keys: Vec<String>,
    ) -> Self {
        Self {
            ctx,
            fetcher,
            extractor,
            api_keys,
        }
    }

    /// Scan every year of `params` in order.
    ///
    /// Per-index failures are recorded on the attempt and counted; only
    /// failing to load the year's known ranges or the filter rules aborts.
    pub async fn scan(&self, params: &ScanParams) -> anyhow::Result<ScanStats> {
        let policy = ExclusionPolicy::load(&self.ctx).await?;
        let limiter = Semaphore::new(params.concurrency.max(1));
        let mut stats = ScanStats::default();

        for &year in &params.years {
            let ranges = self.ctx.ranges().for_year(year).await?;
            self.scan_year(year, &ranges, params, &policy, &limiter, &mut stats)
                .await;
        }

        info!(
            "Scan done: {} attempted, {} downloaded, {} not found, {} errors, {} skipped",
            stats.attempted, stats.downloaded, stats.not_found, stats.errors, stats.skipped
        );
        Ok(stats)
    }

    async fn scan_year(
        &self,
        year: i32,
        ranges: &[NotFoundRange],
        params: &ScanParams,
        policy: &ExclusionPolicy,
        limiter: &Semaphore,
        stats: &mut ScanStats,
    ) {
        let end = params.end_index.unwrap_or(i64::MAX);
        let mut state = YearState::default();
        let mut in_flight = FuturesOrdered::new();
        let mut next_range = 0;
        let mut i = params.start_index.max(1);

        while i <= end {
            while !state.may_continue(params) {
                match in_flight.next().await {
                    Some(settled) => state.fold(settled, stats),
                    None => break,
                }
            }
            if !state.may_continue(params) {
                debug!(
                    "[{}-{}] stopping year (streak {}, found {})",
                    year, i, state.streak, state.found
                );
                break;
            }

            while next_range < ranges.len() && ranges[next_range].end_index < i {
                next_range += 1;
            }
            if let Some(range) = ranges.get(next_range).filter(|r| r.contains(i)) {
                let jump = range.end_index.min(end) - i + 1;
                info!(
                    "[{}-{}] known not_found range [{}-{}], skipping {}",
                    year, i, range.start_index, range.end_index, jump
                );
                stats.skipped += jump;
                stats.skipped_known_not_found += jump;
                state.pending_misses += jump;
                in_flight.push_back(self.run_entry(Entry::Jump(jump), year, params, policy, limiter));
                i = range.end_index.saturating_add(1);
                continue;
            }

            stats.attempted += 1;
            state.pending_misses += 1;
            state.pending_units += 1;
            in_flight.push_back(self.run_entry(Entry::Unit(i), year, params, policy, limiter));

            if in_flight.len() >= FLUSH_EVERY {
                while let Some(settled) = in_flight.next().await {
                    state.fold(settled, stats);
                }
            }
            i += 1;
        }

        while let Some(settled) = in_flight.next().await {
            state.fold(settled, stats);
        }
    }

    async fn run_entry(
        &self,
        entry: Entry,
        year: i32,
        params: &ScanParams,
        policy: &ExclusionPolicy,
        limiter: &Semaphore,
    ) -> Settled {
        match entry {
            Entry::Jump(n) => Settled::Jump(n),
            Entry::Unit(index) => {
                // The semaphore is never closed.
                let _permit = limiter.acquire().await.ok();
                Settled::Unit(self.process(year, index, params, policy).await)
            }
        }
    }

    /// Run the whole pipeline for one index, recording failures.
    pub async fn process(
        &self,
        year: i32,
        index: i64,
        params: &ScanParams,
        policy: &ExclusionPolicy,
    ) -> UnitOutcome {
        let url = decree_url(&params.base_url, year, index);
        match self.try_process(&url, year, index, params, policy).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                warn!("[{}-{}] error: {}", year, index, message);
                let outcome = AttemptOutcome {
                    error: Some(message.as_str()),
                    ..Default::default()
                };
                if let Err(db_err) = self
                    .ctx
                    .attempts()
                    .finish_attempt(&url, year, index, AttemptStatus::Error, outcome)
                    .await
                {
                    error!("[{}-{}] could not record error: {}", year, index, db_err);
                }
                UnitOutcome::Failed
            }
        }
    }

    async fn try_process(
        &self,
        url: &str,
        year: i32,
        index: i64,
        params: &ScanParams,
        policy: &ExclusionPolicy,
    ) -> anyhow::Result<UnitOutcome> {
        let attempts = self.ctx.attempts();
        let documents = self.ctx.documents();

        if documents.exists_by_url(url).await? {
            debug!("[{}-{}] already stored, skipping", year, index);
            return Ok(UnitOutcome::AlreadyDone);
        }
        if let Some(attempt) = attempts.get(url).await? {
            if attempt.status == AttemptStatus::Success {
                debug!("[{}-{}] attempt already succeeded, skipping", year, index);
                return Ok(UnitOutcome::AlreadyDone);
            }
        }

        attempts.begin_attempt(url, year, index).await?;

        let (http_status, body) = match probe(self.fetcher.as_ref(), url, params.head_check).await? {
            Probe::Absent => {
                info!("[{}-{}] 404 -> not_found", year, index);
                attempts
                    .finish_attempt(
                        url,
                        year,
                        index,
                        AttemptStatus::NotFound,
                        AttemptOutcome {
                            http_status: Some(404),
                            ..Default::default()
                        },
                    )
                    .await?;
                return Ok(UnitOutcome::NotFound);
            }
            Probe::Present { http_status, body } => (http_status, body),
        };
        info!("[{}-{}] GET {} ({} bytes), running OCR", year, index, http_status, body.len());

        let extracted = self
            .extractor
            .extract(&body, &self.api_keys, &params.ocr, params.limits)
            .await?;
        debug!("[{}-{}] OCR ok ({} chars)", year, index, extracted.text.len());

        let candidate = Candidate {
            text: Some(&extracted.text),
            url,
            ..Default::default()
        };
        if let Some(reason) = policy.check(&candidate) {
            info!("[{}-{}] excluded ({}), not stored", year, index, reason);
            attempts
                .finish_attempt(
                    url,
                    year,
                    index,
                    AttemptStatus::Excluded,
                    AttemptOutcome {
                        http_status: Some(i32::from(http_status)),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(UnitOutcome::Excluded);
        }

        let document_id = documents
            .upsert(&NewDocumentData {
                url: url.to_string(),
                year,
                index,
                text: extracted.text,
                bytes: body.len() as i64,
                ocr_provider: extracted.provider,
                ocr_confidence: None,
            })
            .await?;
        attempts
            .finish_attempt(
                url,
                year,
                index,
                AttemptStatus::Success,
                AttemptOutcome {
                    http_status: Some(i32::from(http_status)),
                    document_id: Some(document_id.as_str()),
                    ..Default::default()
                },
            )
            .await?;
        info!("[{}-{}] stored document {}", year, index, document_id);
        Ok(UnitOutcome::Downloaded)
    }
}
