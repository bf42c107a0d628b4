//! Binary entrypoint for the dataset ingestion HTTP service.
//!
//! Startup stays thin: logging, configuration, then `holo_ingest::run`.

use anyhow::Result;
use holo_ingest::{run, IngestConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("holo_ingest=info,warn")),
        )
        .init();
    let config = IngestConfig::from_env()?;
    run(config).await
}
