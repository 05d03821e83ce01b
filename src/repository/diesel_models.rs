//! Diesel row types for the harvester tables.
//!
//! Records mirror the schema one-to-one; conversion into domain models lives
//! next to the repository that loads them.

use diesel::prelude::*;

use crate::schema;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::crawl_attempts)]
#[diesel(primary_key(url))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CrawlAttemptRecord {
    pub url: String,
    pub year: i32,
    pub doc_index: i64,
    pub status: String,
    pub attempts: i32,
    pub last_visited_at: Option<String>,
    pub http_status: Option<i32>,
    pub last_error: Option<String>,
    pub document_id: Option<String>,
    pub updated_at: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentRecord {
    pub id: String,
    pub url: String,
    pub year: i32,
    pub doc_index: i64,
    pub title: Option<String>,
    pub text: String,
    pub bytes: i64,
    pub ocr_provider: String,
    pub ocr_confidence: Option<f64>,
    pub tag: Option<String>,
    pub category: Option<String>,
    pub user_edited: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = schema::documents)]
pub struct NewDocument<'a> {
    pub id: &'a str,
    pub url: &'a str,
    pub year: i32,
    pub doc_index: i64,
    pub text: &'a str,
    pub bytes: i64,
    pub ocr_provider: &'a str,
    pub ocr_confidence: Option<f64>,
    pub user_edited: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::not_found_ranges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NotFoundRangeRecord {
    pub id: String,
    pub year: i32,
    pub start_index: i64,
    pub end_index: i64,
    pub count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::filter_rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FilterRuleRecord {
    pub id: String,
    pub rule_type: String,
    pub field: String,
    pub mode: String,
    pub pattern: String,
    pub active: i32,
    pub created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = schema::filter_rules)]
pub struct NewFilterRule<'a> {
    pub id: &'a str,
    pub rule_type: &'a str,
    pub field: &'a str,
    pub mode: &'a str,
    pub pattern: &'a str,
    pub active: i32,
    pub created_at: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::job_configs)]
#[diesel(primary_key(name))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobConfigRecord {
    pub name: String,
    pub enabled: i32,
    pub params: String,
    pub updated_at: String,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::run_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunLogRecord {
    pub id: String,
    pub name: String,
    pub started_at: String,
    pub duration_sec: f64,
    pub attempted: i64,
    pub downloaded: i64,
    pub not_found: i64,
    pub errors: i64,
    pub skipped: i64,
    pub extra: String,
}

#[derive(Insertable)]
#[diesel(table_name = schema::run_logs)]
pub struct NewRunLog<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub started_at: &'a str,
    pub duration_sec: f64,
    pub attempted: i64,
    pub downloaded: i64,
    pub not_found: i64,
    pub errors: i64,
    pub skipped: i64,
    pub extra: &'a str,
}
