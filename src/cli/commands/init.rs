//! Initialize command.

use crate::cli::helpers::{open_context, success, warning};
use crate::config::{ocr_api_keys, Settings, OCR_API_KEY_ENV};
use crate::repository::util::redact_url_password;

/// Create the schema in the configured database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    open_context(settings).await?;

    println!(
        "{} Initialized database {}",
        success(),
        redact_url_password(&settings.database_url)
    );

    if ocr_api_keys().is_empty() {
        println!(
            "{} No OCR key found; set {} before crawling",
            warning(),
            OCR_API_KEY_ENV
        );
    }
    Ok(())
}
