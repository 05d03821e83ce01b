//! Storage budget enforcement.
//!
//! Deletes the oldest documents until the stored PDF bytes fit the budget.
//! User-edited documents are never candidates, and documents matched by an
//! active protect rule are passed over.

use serde::Serialize;
use tracing::{debug, info};

use super::filters::ProtectionPolicy;
use crate::repository::{DbContext, DbError, DocumentCursor};

/// Candidates fetched per page.
const PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeStats {
    pub deleted: i64,
    pub freed_bytes: i64,
    pub total_after: i64,
}

pub struct BudgetEnforcer {
    ctx: DbContext,
}

impl BudgetEnforcer {
    pub fn new(ctx: DbContext) -> Self {
        Self { ctx }
    }

    pub async fn enforce(
        &self,
        max_bytes: i64,
        max_deletes_per_run: usize,
    ) -> Result<PurgeStats, DbError> {
        let documents = self.ctx.documents();
        let total = documents.totals().await?.bytes;
        if total <= max_bytes {
            debug!("Storage {} bytes within budget {}", total, max_bytes);
            return Ok(PurgeStats {
                total_after: total,
                ..Default::default()
            });
        }

        let protection = ProtectionPolicy::load(&self.ctx).await?;
        let mut stats = PurgeStats::default();
        let mut cursor = DocumentCursor::default();

        'pages: while total - stats.freed_bytes > max_bytes {
            let page = documents.oldest_unedited_after(&cursor, PAGE_SIZE).await?;
            let Some(next) = page.next else {
                break;
            };

            for doc in page.documents {
                if protection.protects(doc.tag.as_deref(), doc.category.as_deref()) {
                    debug!("Keeping protected document {}", doc.id);
                    continue;
                }
                self.ctx.attempts().detach_document(&doc.id).await?;
                documents.delete(&doc.id).await?;
                stats.freed_bytes += doc.bytes;
                stats.deleted += 1;
                debug!("Deleted document {} ({} bytes)", doc.url, doc.bytes);

                if stats.deleted as usize >= max_deletes_per_run
                    || total - stats.freed_bytes <= max_bytes
                {
                    break 'pages;
                }
            }
            cursor = next;
        }

        stats.total_after = documents.totals().await?.bytes;
        info!(
            "Purge: deleted {} documents, freed {} bytes, {} bytes stored",
            stats.deleted, stats.freed_bytes, stats.total_after
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterField, FilterMode, FilterRule, FilterType, NewDocumentData};
    use crate::repository::test_support::setup_test_db;

    async fn store(ctx: &DbContext, index: i64, bytes: i64) -> String {
        let id = ctx
            .documents()
            .upsert(&NewDocumentData {
                url: format!("http://a/doc/decret-2024-{index}/download"),
                year: 2024,
                index,
                text: format!("Décret {index}"),
                bytes,
                ocr_provider: "ocr.space".to_string(),
                ocr_confidence: None,
            })
            .await
            .unwrap();
        // Distinct creation times keep the deletion order deterministic.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        id
    }

    #[tokio::test]
    async fn test_under_budget_is_noop() {
        let (ctx, _dir) = setup_test_db().await;
        store(&ctx, 1, 100).await;

        let stats = BudgetEnforcer::new(ctx).enforce(100, 10).await.unwrap();
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.total_after, 100);
    }

    #[tokio::test]
    async fn test_oldest_deleted_first() {
        let (ctx, _dir) = setup_test_db().await;
        let first = store(&ctx, 1, 100).await;
        let second = store(&ctx, 2, 100).await;
        let third = store(&ctx, 3, 100).await;

        let stats = BudgetEnforcer::new(ctx.clone()).enforce(150, 10).await.unwrap();

        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.freed_bytes, 200);
        assert_eq!(stats.total_after, 100);
        assert!(ctx.documents().get(&first).await.unwrap().is_none());
        assert!(ctx.documents().get(&second).await.unwrap().is_none());
        assert!(ctx.documents().get(&third).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_edited_and_protected_documents_survive() {
        let (ctx, _dir) = setup_test_db().await;
        let edited = store(&ctx, 1, 100).await;
        let protected = store(&ctx, 2, 100).await;
        let plain = store(&ctx, 3, 100).await;

        let docs = ctx.documents();
        docs.annotate(&edited, Some("Titre"), None, None, true)
            .await
            .unwrap();
        docs.annotate(&protected, None, Some("archive"), None, false)
            .await
            .unwrap();
        ctx.filters()
            .create(&FilterRule::new(
                FilterType::Protect,
                FilterField::Tag,
                FilterMode::Contains,
                "archive",
            ))
            .await
            .unwrap();

        let stats = BudgetEnforcer::new(ctx.clone()).enforce(0, 10).await.unwrap();

        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.total_after, 200);
        assert!(docs.get(&edited).await.unwrap().is_some());
        assert!(docs.get(&protected).await.unwrap().is_some());
        assert!(docs.get(&plain).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cap_and_detach() {
        let (ctx, _dir) = setup_test_db().await;
        let mut ids = Vec::new();
        for i in 1..=4 {
            ids.push(store(&ctx, i, 10).await);
        }
        let url = "http://a/doc/decret-2024-1/download";
        ctx.attempts()
            .finish_attempt(
                url,
                2024,
                1,
                crate::models::AttemptStatus::Success,
                crate::repository::AttemptOutcome {
                    http_status: Some(200),
                    document_id: Some(ids[0].as_str()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stats = BudgetEnforcer::new(ctx.clone()).enforce(0, 3).await.unwrap();

        assert_eq!(stats.deleted, 3);
        assert_eq!(stats.total_after, 10);
        let attempt = ctx.attempts().get(url).await.unwrap().unwrap();
        assert_eq!(attempt.document_id, None);
    }
}
