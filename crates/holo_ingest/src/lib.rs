//! HoloIngest: schema-evolving JSON dataset ingestion into PostgreSQL.
//!
//! A request names one table and carries an array of flat row objects. The
//! engine validates the payload, creates the table or widens it with new TEXT
//! columns, inserts every row with bound parameters and signals the
//! schema-caching proxy, all inside one transaction.
//!
//! This module is the composition root: configuration, the HTTP front end
//! and the PostgreSQL sink are wired together here.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub mod dataset;
pub mod error;
pub mod http;
pub mod identifier;
pub mod ingest;
pub mod postgres;
pub mod schema;
pub mod sql;

pub use dataset::{validate, DatasetRow, ValidatedDataset, ValidationError, PRIMARY_KEY_COLUMN};
pub use error::{ErrorCategory, IngestError};
pub use http::HttpOptions;
pub use identifier::{Identifier, IdentifierError};
pub use ingest::{
    apply_dataset, ingest_payload, DatasetSink, IngestOutcome, DEFAULT_NOTIFY_CHANNEL,
};
pub use postgres::PgIngestor;
pub use schema::{reconcile, ReconciliationDecision, SchemaSession};

const DEFAULT_HTTP_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000);
const DEFAULT_DATABASE_URL: &str = "host=127.0.0.1 port=5432 user=postgres dbname=postgres";
const DEFAULT_POSTGREST_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Runtime configuration for one ingestion service process.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// HTTP bind address.
    pub http_addr: SocketAddr,
    /// libpq-style connection string or `postgres://` URL.
    pub database_url: String,
    /// Public base URL of the schema-caching proxy.
    pub postgrest_url: String,
    /// Channel notified after each committed ingestion.
    pub notify_channel: String,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Connection establishment timeout (`0` disables).
    pub connect_timeout: Duration,
}

impl IngestConfig {
    /// Loads configuration from `HOLO_INGEST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_addr = env_value(&lookup, "HOLO_INGEST_HTTP_ADDR", DEFAULT_HTTP_ADDR)?;
        let database_url = lookup("HOLO_INGEST_DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let postgrest_url = lookup("HOLO_INGEST_POSTGREST_URL")
            .unwrap_or_else(|| DEFAULT_POSTGREST_URL.to_string());
        let notify_channel = lookup("HOLO_INGEST_NOTIFY_CHANNEL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_NOTIFY_CHANNEL.to_string());
        let max_body_bytes =
            env_value(&lookup, "HOLO_INGEST_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?.max(1);
        let connect_timeout_ms = env_value(
            &lookup,
            "HOLO_INGEST_CONNECT_TIMEOUT_MS",
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?;

        Ok(Self {
            http_addr,
            database_url,
            postgrest_url,
            notify_channel,
            max_body_bytes,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
        })
    }

    fn http_options(&self) -> HttpOptions {
        HttpOptions {
            postgrest_url: self.postgrest_url.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Runs the service until Ctrl-C is received.
pub async fn run(config: IngestConfig) -> Result<()> {
    run_with_shutdown(config, async {
        // A failed signal handler install also ends the server.
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

/// Runs the service with an externally supplied shutdown signal.
pub async fn run_with_shutdown<F>(config: IngestConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let ingestor = PgIngestor::new(
        &config.database_url,
        config.connect_timeout,
        &config.notify_channel,
    )
    .context("build postgres ingestor")?;
    let listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("bind http server {}", config.http_addr))?;
    info!(
        http_addr = %config.http_addr,
        notify_channel = %ingestor.notify_channel(),
        "holo_ingest listening"
    );

    let sink: Arc<dyn DatasetSink> = Arc::new(ingestor);
    http::serve(listener, sink, config.http_options(), shutdown).await
}

/// Reads `key` through `lookup` and parses it, or returns `default` when unset.
fn env_value<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has an invalid value {raw:?}"))
}
