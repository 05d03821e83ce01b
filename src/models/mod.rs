//! Data models for the decree harvester.

mod crawl;
mod document;
mod filter;
mod job;
mod range;

pub use crawl::{decree_url, AttemptStatus, CrawlAttempt};
pub use document::{Document, NewDocumentData, StorageTotals};
pub use filter::{FilterField, FilterMode, FilterRule, FilterType, RuleMatcher};
pub use job::{JobName, RunAggregate, RunLog, RunStats};
pub use range::NotFoundRange;
