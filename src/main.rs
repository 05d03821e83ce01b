//! `decrees`: harvest published decree PDFs and their OCR text.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins; otherwise warnings only, or info with `-v`.
fn init_tracing(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("decree_harvest={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry OCR_API_KEY and DATABASE_URL.
    let _ = dotenvy::dotenv();
    init_tracing(decree_harvest::cli::is_verbose());

    decree_harvest::cli::run().await
}
