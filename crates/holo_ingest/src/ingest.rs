//! Ingestion unit of work: inspect, reconcile, apply DDL, insert, notify.
//!
//! [`apply_dataset`] runs every step against one [`SchemaSession`]. The caller
//! owns the transaction and commits only when this returns `Ok`; any error
//! leaves the session to be rolled back so no table, column, row or
//! notification survives a failed request.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::dataset::{validate, ValidatedDataset};
use crate::error::{ErrorCategory, IngestError};
use crate::identifier::Identifier;
use crate::schema::{inspect, reconcile, ReconciliationDecision, SchemaSession};
use crate::sql;

/// Channel the schema-caching proxy listens on for reload requests.
pub const DEFAULT_NOTIFY_CHANNEL: &str = "pgrst";

/// Result of one committed ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub table_name: String,
    pub rows_inserted: u64,
    /// `true` when this request created the table.
    pub table_created: bool,
    /// Columns added to an existing table by this request.
    pub columns_added: Vec<String>,
}

/// Destination that applies a validated dataset atomically.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn ingest(&self, dataset: &ValidatedDataset) -> Result<IngestOutcome, IngestError>;
}

/// Validates a raw payload and hands it to `sink`.
///
/// Validation failures return before the sink is touched, so a rejected
/// payload never opens a transaction.
pub async fn ingest_payload(
    sink: &dyn DatasetSink,
    payload: &Value,
) -> Result<IngestOutcome, IngestError> {
    let dataset = match validate(payload) {
        Ok(dataset) => dataset,
        Err(err) => {
            warn!(error = %err, "rejected dataset payload");
            return Err(err.into());
        }
    };

    let span = info_span!(
        "ingest_dataset",
        table_name = %dataset.table_name(),
        rows = dataset.rows().len()
    );
    async {
        let result = sink.ingest(&dataset).await;
        match &result {
            Ok(outcome) => info!(
                rows_inserted = outcome.rows_inserted,
                table_created = outcome.table_created,
                "dataset ingested"
            ),
            Err(err) => match err.category() {
                ErrorCategory::ClientFault => warn!(error = %err, "dataset rejected"),
                ErrorCategory::Conflict => warn!(error = %err, "dataset ingestion conflicted"),
                ErrorCategory::Internal => error!(error = %err, "dataset ingestion failed"),
            },
        }
        result
    }
    .instrument(span)
    .await
}

/// Applies `dataset` inside the session's open transaction.
pub async fn apply_dataset<S>(
    session: &mut S,
    dataset: &ValidatedDataset,
    notify_channel: &Identifier,
) -> Result<IngestOutcome, IngestError>
where
    S: SchemaSession + ?Sized,
{
    let table = dataset.table_name();
    let existing = inspect(session, table).await?;

    let mut table_created = false;
    let mut columns_added = Vec::new();
    match reconcile(existing.as_ref(), dataset.columns()) {
        ReconciliationDecision::CreateTable { columns } => {
            session.execute(&sql::create_table(table, &columns)).await?;
            table_created = true;
            info!(
                table_name = %table,
                columns = columns.len(),
                "created dataset table"
            );
        }
        ReconciliationDecision::EvolveTable { columns_to_add } => {
            for statement in sql::add_columns(table, &columns_to_add) {
                session.execute(&statement).await?;
            }
            // Decision: an evolve with nothing to add is the append path and stays quiet.
            if !columns_to_add.is_empty() {
                info!(
                    table_name = %table,
                    added = %join_names(&columns_to_add),
                    "added columns to dataset table"
                );
            }
            columns_added = columns_to_add
                .iter()
                .map(|column| column.as_str().to_string())
                .collect();
        }
        ReconciliationDecision::RejectNoOverlap {
            existing,
            requested,
        } => {
            return Err(IngestError::NoSharedColumns {
                table_name: table.as_str().to_string(),
                existing,
                requested,
            });
        }
    }

    let rows_inserted = insert_rows(session, dataset).await?;
    session.execute(&sql::notify(notify_channel)).await?;
    debug!(channel = %notify_channel, "queued schema cache reload notification");

    Ok(IngestOutcome {
        table_name: table.as_str().to_string(),
        rows_inserted,
        table_created,
        columns_added,
    })
}

/// Inserts every row with its own parameterized statement.
async fn insert_rows<S>(session: &mut S, dataset: &ValidatedDataset) -> Result<u64, IngestError>
where
    S: SchemaSession + ?Sized,
{
    let table = dataset.table_name();
    let mut rows_inserted = 0u64;
    for (idx, row) in dataset.rows().iter().enumerate() {
        let affected = session.execute(&sql::insert_row(table, row)).await?;
        // Decision: a single-row INSERT reporting anything but one row means the
        // backend did not apply it as issued; abort instead of miscounting.
        if affected != 1 {
            return Err(IngestError::Internal(anyhow::anyhow!(
                "insert of row {} into {} affected {affected} rows",
                idx + 1,
                table
            )));
        }
        rows_inserted += affected;
    }
    debug!(table_name = %table, rows = rows_inserted, "inserted dataset rows");
    Ok(rows_inserted)
}

fn join_names(columns: &[Identifier]) -> String {
    columns
        .iter()
        .map(Identifier::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
