//! Incremental harvester for government decree PDFs.
//!
//! Walks the `{year}-{index}` address space of the decree archive, probes each
//! position, OCRs the PDFs it finds and keeps the store within a byte budget.

pub mod cli;
pub mod config;
pub mod http_client;
pub mod jobs;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod schema;
pub mod services;

pub use config::Settings;
pub use repository::DbContext;
