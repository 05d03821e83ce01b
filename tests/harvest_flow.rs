//! End-to-end harvesting flows over a temporary SQLite database, a fake
//! archive and a fake OCR provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use decree_harvest::http_client::{DocumentFetcher, FetchError, FetchedBody};
use decree_harvest::jobs::{JobRunner, JobStatus};
use decree_harvest::models::{decree_url, AttemptStatus, JobName, RunStats};
use decree_harvest::ocr::{OcrEngine, OcrError, OcrExtractor, OcrOptions};
use decree_harvest::repository::{DbPool, RunLogQuery};
use decree_harvest::services::{RangeCompactor, ScanParams, Scanner};
use decree_harvest::{DbContext, Settings};

const BASE: &str = "http://archive.test";

async fn setup_db() -> (DbContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(DbPool::sqlite_file(&dir.path().join("harvest.db")));
    ctx.init_schema().await.unwrap();
    (ctx, dir)
}

/// Serves fixed bodies by URL and records every request.
#[derive(Default)]
struct Archive {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl Archive {
    fn with(mut self, year: i32, index: i64, text: &str) -> Self {
        self.bodies
            .insert(decree_url(BASE, year, index), text.as_bytes().to_vec());
        self
    }

    fn requested(&self, year: i32, index: i64) -> bool {
        let url = decree_url(BASE, year, index);
        self.requests.lock().unwrap().iter().any(|u| *u == url)
    }
}

#[async_trait]
impl DocumentFetcher for Archive {
    async fn head_status(&self, url: &str) -> Result<u16, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(if self.bodies.contains_key(url) { 200 } else { 404 })
    }

    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(match self.bodies.get(url) {
            Some(body) => FetchedBody {
                status: 200,
                body: body.clone(),
            },
            None => FetchedBody {
                status: 404,
                body: Vec::new(),
            },
        })
    }
}

/// Echoes the payload; the key "spent" always fails on quota.
#[derive(Default)]
struct Provider {
    keys_used: Mutex<Vec<String>>,
}

#[async_trait]
impl OcrEngine for Provider {
    async fn recognize(
        &self,
        pdf: &[u8],
        api_key: &str,
        _options: &OcrOptions,
    ) -> Result<String, OcrError> {
        self.keys_used.lock().unwrap().push(api_key.to_string());
        if api_key == "spent" {
            return Err(OcrError::Processing(
                "You may only perform this action upto maximum OCR requests".to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(pdf).to_string())
    }

    fn provider(&self) -> &'static str {
        "fake-ocr"
    }
}

fn scanner(ctx: &DbContext, archive: Arc<Archive>, provider: Arc<Provider>) -> Scanner {
    Scanner::new(
        ctx.clone(),
        archive,
        Arc::new(OcrExtractor::new(provider)),
        vec!["spent".to_string(), "fresh".to_string()],
    )
}

fn window(year: i32, start: i64, end: i64) -> ScanParams {
    ScanParams {
        years: vec![year],
        start_index: start,
        end_index: Some(end),
        concurrency: 2,
        base_url: BASE.to_string(),
        ..ScanParams::default()
    }
}

#[tokio::test]
async fn test_mixed_year_end_to_end() {
    let (ctx, _dir) = setup_db().await;
    let archive = Arc::new(
        Archive::default()
            .with(2024, 1, "Décret portant création d'un office")
            .with(2024, 3, "Décret portant nomination du directeur"),
    );
    let provider = Arc::new(Provider::default());

    let stats = scanner(&ctx, archive, provider.clone())
        .scan(&window(2024, 1, 3))
        .await
        .unwrap();

    assert_eq!(
        stats.run_stats(),
        RunStats {
            attempted: 3,
            downloaded: 1,
            not_found: 1,
            errors: 0,
            skipped: 1,
        }
    );

    let doc = ctx
        .documents()
        .get_by_url(&decree_url(BASE, 2024, 1))
        .await
        .unwrap()
        .expect("document stored");
    assert_eq!(doc.ocr_provider, "fake-ocr");
    assert!(doc.text.contains("création"));

    let attempts = ctx.attempts();
    let status = |i| decree_url(BASE, 2024, i);
    assert_eq!(
        attempts.get(&status(1)).await.unwrap().unwrap().status,
        AttemptStatus::Success
    );
    assert_eq!(
        attempts.get(&status(2)).await.unwrap().unwrap().status,
        AttemptStatus::NotFound
    );
    assert_eq!(
        attempts.get(&status(3)).await.unwrap().unwrap().status,
        AttemptStatus::Excluded
    );
    assert_eq!(ctx.documents().totals().await.unwrap().documents, 1);

    // Each OCR'd decree first hit the exhausted key, then the fresh one.
    let keys = provider.keys_used.lock().unwrap().clone();
    assert_eq!(keys.iter().filter(|k| *k == "spent").count(), 2);
    assert_eq!(keys.iter().filter(|k| *k == "fresh").count(), 2);
}

#[tokio::test]
async fn test_compacted_positions_are_never_probed_again() {
    let (ctx, _dir) = setup_db().await;
    let first = Arc::new(Archive::default().with(2023, 1, "Décret 1"));
    let provider = Arc::new(Provider::default());

    scanner(&ctx, first, provider.clone())
        .scan(&window(2023, 1, 12))
        .await
        .unwrap();
    let compact = RangeCompactor::new(ctx.clone())
        .compact(&[2023], 500)
        .await
        .unwrap();
    assert_eq!(compact.ranges_created, 1);
    assert_eq!(compact.rows_deleted, 11);

    // Compacting again changes nothing.
    let again = RangeCompactor::new(ctx.clone())
        .compact(&[2023], 500)
        .await
        .unwrap();
    assert_eq!(again.ranges_created + again.ranges_extended, 0);

    let second = Arc::new(Archive::default().with(2023, 13, "Décret 13"));
    let stats = scanner(&ctx, second.clone(), provider)
        .scan(&window(2023, 1, 13))
        .await
        .unwrap();

    assert_eq!(stats.skipped_known_not_found, 11);
    assert_eq!(stats.downloaded, 1);
    for i in 2..=12 {
        assert!(!second.requested(2023, i), "probed 2023-{i}");
    }

    let ranges = ctx.ranges().for_year(2023).await.unwrap();
    assert_eq!(ranges.len(), 1);
    assert_eq!((ranges[0].start_index, ranges[0].end_index), (2, 12));
}

#[tokio::test]
async fn test_jobs_record_and_prune_run_logs() {
    let (ctx, _dir) = setup_db().await;
    let archive = Arc::new(Archive::default().with(2026, 1, "Décret 2026-1"));
    let settings = Settings {
        base_url: BASE.to_string(),
        run_log_retention: 2,
        ..Settings::default()
    };
    let runner = JobRunner::new(ctx.clone(), settings, vec!["fresh".to_string()])
        .with_fetcher(archive)
        .with_extractor(Arc::new(OcrExtractor::new(Arc::new(Provider::default()))))
        .with_year(2026);

    for _ in 0..3 {
        let report = runner.run(JobName::Latest).await.unwrap();
        assert_eq!(report.status, JobStatus::Completed);
    }
    let purge = runner.run(JobName::Purge).await.unwrap();
    assert_eq!(purge.extra["purge"]["deleted"], 0);

    let logs = ctx
        .run_logs()
        .list(&RunLogQuery {
            name: Some("latest".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.stats.downloaded == 0));

    let aggregate = ctx.run_logs().aggregate(&RunLogQuery::default()).await.unwrap();
    assert_eq!(aggregate.count, 3);

    // Three latest runs: one with a download, then two quiet ones.
    let backfill = runner.run(JobName::Backfill).await.unwrap();
    assert_eq!(backfill.status, JobStatus::Waiting);
    assert_eq!(backfill.extra["quietRuns"], 2);
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let (ctx, _dir) = setup_db().await;
    ctx.init_schema().await.unwrap();
    assert_eq!(ctx.documents().totals().await.unwrap().documents, 0);
}
