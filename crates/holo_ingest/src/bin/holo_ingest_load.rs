//! One-shot loader that ingests a JSON payload file without the HTTP server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use holo_ingest::{ingest_payload, PgIngestor, DEFAULT_NOTIFY_CHANNEL};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "holo-ingest-load")]
#[command(about = "Create or extend a PostgreSQL table from a JSON dataset file", long_about = None)]
struct Args {
    /// libpq-style connection string or postgres:// URL.
    #[arg(
        long,
        env = "HOLO_INGEST_DATABASE_URL",
        default_value = "host=127.0.0.1 port=5432 user=postgres dbname=postgres"
    )]
    database_url: String,

    /// Payload file: `{"table_name": [{"column": "value"}, ...]}`.
    #[arg(long)]
    file: PathBuf,

    /// Channel notified after the ingestion commits.
    #[arg(long, default_value = DEFAULT_NOTIFY_CHANNEL)]
    notify_channel: String,

    /// Connection timeout, e.g. `500ms`, `5s` or `1m` (`0s` disables).
    #[arg(long, default_value = "5s")]
    connect_timeout: humantime::Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("holo_ingest=info,warn")),
        )
        .init();
    let args = Args::parse();

    let raw = std::fs::read(&args.file)
        .with_context(|| format!("read payload file {}", args.file.display()))?;
    let payload: serde_json::Value = serde_json::from_slice(&raw)
        .with_context(|| format!("parse payload file {}", args.file.display()))?;

    let connect_timeout: Duration = args.connect_timeout.into();
    let ingestor = PgIngestor::new(&args.database_url, connect_timeout, &args.notify_channel)?;
    let outcome = ingest_payload(&ingestor, &payload)
        .await
        .map_err(|err| anyhow!("{err}"))?;
    println!("{} {}", outcome.table_name, outcome.rows_inserted);
    Ok(())
}
