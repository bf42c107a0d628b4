//! HTTP front end for dataset ingestion.
//!
//! Routes:
//! - `POST /create-dataset` ingests a JSON payload,
//! - `GET /live` reports liveness.
//!
//! Every response body, including errors, is JSON.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{ErrorCategory, IngestError};
use crate::ingest::{ingest_payload, DatasetSink, IngestOutcome};

const CREATE_DATASET_PATH: &str = "/create-dataset";
const SUCCESS_MESSAGE: &str = "Dataset created successfully";
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Per-server HTTP settings.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Base URL of the schema-caching proxy, used to build dataset links.
    pub postgrest_url: String,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

#[derive(Clone)]
struct AppState {
    sink: Arc<dyn DatasetSink>,
    /// Proxy base URL without a trailing slash.
    postgrest_url: Arc<str>,
}

#[derive(Debug, Serialize)]
struct CreateDatasetResponse {
    message: &'static str,
    url: String,
    table_name: String,
    rows_inserted: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct LiveResponse {
    status: &'static str,
}

/// Builds the ingestion router over `sink`.
pub fn router(sink: Arc<dyn DatasetSink>, options: HttpOptions) -> Router {
    let state = AppState {
        sink,
        postgrest_url: Arc::from(options.postgrest_url.trim_end_matches('/')),
    };
    Router::new()
        .route(
            CREATE_DATASET_PATH,
            post(create_dataset).fallback(method_not_allowed),
        )
        .route("/live", get(live))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    sink: Arc<dyn DatasetSink>,
    options: HttpOptions,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(sink, options))
        .with_graceful_shutdown(shutdown)
        .await
        .context("serve http")?;
    info!("http server stopped");
    Ok(())
}

async fn create_dataset(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // Oversized bodies surface here as a 413 rejection from the body limit.
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(rejection.status(), rejection.body_text()),
    };
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {err}"))
        }
    };
    match ingest_payload(state.sink.as_ref(), &payload).await {
        Ok(outcome) => success_response(outcome, &state.postgrest_url),
        Err(err) => ingest_error_response(&err),
    }
}

async fn live() -> Json<LiveResponse> {
    Json(LiveResponse { status: "live" })
}

async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "Use POST for /create-dataset",
    )
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn success_response(outcome: IngestOutcome, postgrest_url: &str) -> Response {
    let response = CreateDatasetResponse {
        message: SUCCESS_MESSAGE,
        url: format!("{postgrest_url}/{}", outcome.table_name),
        table_name: outcome.table_name,
        rows_inserted: outcome.rows_inserted,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Maps engine errors to status codes; internal detail is logged, never returned.
fn ingest_error_response(err: &IngestError) -> Response {
    match err.category() {
        ErrorCategory::ClientFault => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        ErrorCategory::Conflict => error_response(StatusCode::CONFLICT, err.to_string()),
        ErrorCategory::Internal => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
        }
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: error.into(),
    };
    (status, Json(body)).into_response()
}
