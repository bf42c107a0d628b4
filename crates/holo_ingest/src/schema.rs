//! Schema inspection and reconciliation against the live catalog.
//!
//! The catalog is the single source of truth: every ingestion re-reads table
//! existence and columns inside its own transaction and nothing is cached
//! across requests.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::IngestError;
use crate::identifier::Identifier;
use crate::sql::Statement;

/// Transaction-scoped access to the catalog and statement execution.
///
/// Implementations must run every call inside one open transaction so that
/// the caller decides whether the whole unit commits or rolls back.
#[async_trait]
pub trait SchemaSession: Send {
    /// Returns `true` when `table` exists in the current schema.
    async fn table_exists(&mut self, table: &Identifier) -> Result<bool, IngestError>;

    /// Returns the table's column names, excluding the synthetic primary key.
    async fn existing_columns(&mut self, table: &Identifier)
        -> Result<BTreeSet<String>, IngestError>;

    /// Executes one statement and returns the affected row count.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, IngestError>;
}

/// Structural action required before rows can be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    /// Table is absent; create it with these columns in first-seen order.
    CreateTable { columns: Vec<Identifier> },
    /// Table exists; add these columns (possibly none) before inserting.
    EvolveTable { columns_to_add: Vec<Identifier> },
    /// Table exists but shares no column with the request; nothing may be written.
    RejectNoOverlap {
        existing: BTreeSet<String>,
        requested: BTreeSet<String>,
    },
}

/// Inspects the catalog for `table`. `None` means the table does not exist.
pub async fn inspect<S>(
    session: &mut S,
    table: &Identifier,
) -> Result<Option<BTreeSet<String>>, IngestError>
where
    S: SchemaSession + ?Sized,
{
    if !session.table_exists(table).await? {
        return Ok(None);
    }
    session.existing_columns(table).await.map(Some)
}

/// Diffs requested columns against the existing schema snapshot.
///
/// Columns present only in `existing` are left untouched; the schema only grows.
pub fn reconcile(
    existing: Option<&BTreeSet<String>>,
    requested: &[Identifier],
) -> ReconciliationDecision {
    let Some(existing) = existing else {
        return ReconciliationDecision::CreateTable {
            columns: requested.to_vec(),
        };
    };

    let shares_column = requested
        .iter()
        .any(|column| existing.contains(column.as_str()));
    if !shares_column {
        return ReconciliationDecision::RejectNoOverlap {
            existing: existing.clone(),
            requested: requested
                .iter()
                .map(|column| column.as_str().to_string())
                .collect(),
        };
    }

    let columns_to_add = requested
        .iter()
        .filter(|column| !existing.contains(column.as_str()))
        .cloned()
        .collect();
    ReconciliationDecision::EvolveTable { columns_to_add }
}
