//! Document repository.

use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::RunQueryDsl;

use super::diesel_models::{DocumentRecord, NewDocument};
use super::pool::{DbError, DbPool};
use super::{now_rfc3339, parse_datetime};
use crate::models::{Document, NewDocumentData, StorageTotals};
use crate::schema::documents;
use crate::with_conn;

impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        Document {
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
            user_edited: record.user_edited != 0,
            id: record.id,
            url: record.url,
            year: record.year,
            index: record.doc_index,
            title: record.title,
            text: record.text,
            bytes: record.bytes,
            ocr_provider: record.ocr_provider,
            ocr_confidence: record.ocr_confidence,
            tag: record.tag,
            category: record.category,
        }
    }
}

#[derive(QueryableByName)]
struct TotalsRow {
    #[diesel(sql_type = BigInt)]
    documents: i64,
    #[diesel(sql_type = BigInt)]
    bytes: i64,
}

/// Position in the (created_at, id) deletion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentCursor {
    pub created_at: String,
    pub id: String,
}

/// One page of deletion candidates plus the cursor that follows it.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub next: Option<DocumentCursor>,
}

#[derive(Clone)]
pub struct DocumentRepository {
    pool: DbPool,
}

impl DocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, DbError> {
        with_conn!(self.pool, conn => {
            documents::table
                .find(id)
                .first::<DocumentRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(Document::from))
        })
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<Document>, DbError> {
        with_conn!(self.pool, conn => {
            documents::table
                .filter(documents::url.eq(url))
                .first::<DocumentRecord>(&mut conn)
                .await
                .optional()
                .map(|r| r.map(Document::from))
        })
    }

    pub async fn exists_by_url(&self, url: &str) -> Result<bool, DbError> {
        use diesel::dsl::count_star;
        with_conn!(self.pool, conn => {
            let count: i64 = documents::table
                .filter(documents::url.eq(url))
                .select(count_star())
                .first(&mut conn)
                .await?;
            Ok(count > 0)
        })
    }

    /// Insert or refresh the document stored for a URL. Returns its id.
    ///
    /// Title, tag, category and the user-edited flag are left untouched on
    /// an existing row.
    pub async fn upsert(&self, data: &NewDocumentData) -> Result<String, DbError> {
        let now = now_rfc3339();

        with_conn!(self.pool, conn => {
            let existing: Option<String> = documents::table
                .filter(documents::url.eq(&data.url))
                .select(documents::id)
                .first(&mut conn)
                .await
                .optional()?;

            if let Some(id) = existing {
                diesel::update(documents::table.find(&id))
                    .set((
                        documents::year.eq(data.year),
                        documents::doc_index.eq(data.index),
                        documents::text.eq(&data.text),
                        documents::bytes.eq(data.bytes),
                        documents::ocr_provider.eq(&data.ocr_provider),
                        documents::ocr_confidence.eq(data.ocr_confidence),
                        documents::updated_at.eq(&now),
                    ))
                    .execute(&mut conn)
                    .await?;
                return Ok(id);
            }

            let id = uuid::Uuid::new_v4().to_string();
            diesel::insert_into(documents::table)
                .values(NewDocument {
                    id: &id,
                    url: &data.url,
                    year: data.year,
                    doc_index: data.index,
                    text: &data.text,
                    bytes: data.bytes,
                    ocr_provider: &data.ocr_provider,
                    ocr_confidence: data.ocr_confidence,
                    user_edited: 0,
                    created_at: &now,
                    updated_at: &now,
                })
                .execute(&mut conn)
                .await?;
            Ok(id)
        })
    }

    /// Set the user-facing metadata of a document.
    pub async fn annotate(
        &self,
        id: &str,
        title: Option<&str>,
        tag: Option<&str>,
        category: Option<&str>,
        user_edited: bool,
    ) -> Result<usize, DbError> {
        let now = now_rfc3339();
        with_conn!(self.pool, conn => {
            diesel::update(documents::table.find(id))
                .set((
                    documents::title.eq(title),
                    documents::tag.eq(tag),
                    documents::category.eq(category),
                    documents::user_edited.eq(user_edited as i32),
                    documents::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await
        })
    }

    /// Highest stored index for a year.
    pub async fn max_index_for_year(&self, year: i32) -> Result<Option<i64>, DbError> {
        use diesel::dsl::max;
        with_conn!(self.pool, conn => {
            documents::table
                .filter(documents::year.eq(year))
                .select(max(documents::doc_index))
                .first::<Option<i64>>(&mut conn)
                .await
        })
    }

    pub async fn totals(&self) -> Result<StorageTotals, DbError> {
        with_conn!(self.pool, conn => {
            let row: TotalsRow = diesel::sql_query(
                "SELECT CAST(COUNT(*) AS BIGINT) AS documents, \
                 CAST(COALESCE(SUM(bytes), 0) AS BIGINT) AS bytes FROM documents",
            )
            .get_result(&mut conn)
            .await?;
            Ok(StorageTotals {
                documents: row.documents,
                bytes: row.bytes,
            })
        })
    }

    /// Next page of deletion candidates after `cursor`, oldest first.
    ///
    /// User-edited documents are never returned.
    pub async fn oldest_unedited_after(
        &self,
        cursor: &DocumentCursor,
        limit: usize,
    ) -> Result<DocumentPage, DbError> {
        let limit = limit as i64;
        let records: Vec<DocumentRecord> = with_conn!(self.pool, conn => {
            documents::table
                .filter(documents::user_edited.eq(0))
                .filter(
                    documents::created_at.gt(&cursor.created_at).or(documents::created_at
                        .eq(&cursor.created_at)
                        .and(documents::id.gt(&cursor.id))),
                )
                .order((documents::created_at.asc(), documents::id.asc()))
                .limit(limit)
                .load::<DocumentRecord>(&mut conn)
                .await?
        });

        let next = records.last().map(|r| DocumentCursor {
            created_at: r.created_at.clone(),
            id: r.id.clone(),
        });
        Ok(DocumentPage {
            documents: records.into_iter().map(Document::from).collect(),
            next,
        })
    }

    pub async fn delete(&self, id: &str) -> Result<usize, DbError> {
        with_conn!(self.pool, conn => {
            diesel::delete(documents::table.find(id))
                .execute(&mut conn)
                .await
        })
    }
}
