//! Shared helpers for integration tests.
//!
//! `MemoryDatabase` is a transactional stand-in for PostgreSQL: each ingestion
//! works on a private copy of the catalog that replaces the committed state
//! only when the unit of work succeeds.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use holo_ingest::sql::Statement;
use holo_ingest::{
    apply_dataset, DatasetSink, Identifier, IngestError, IngestOutcome, SchemaSession,
    ValidatedDataset, DEFAULT_NOTIFY_CHANNEL, PRIMARY_KEY_COLUMN,
};

/// One stored row, keyed by column name; absent columns read as NULL.
pub type MemoryRow = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTable {
    /// User columns in creation order, excluding the primary key.
    pub columns: Vec<String>,
    pub rows: Vec<MemoryRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    pub tables: BTreeMap<String, MemoryTable>,
    /// Channels notified by committed transactions, in commit order.
    pub notifications: Vec<String>,
}

/// Failure injected into the next ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail the n-th (1-based) INSERT of the transaction.
    FailInsertAt(usize),
    /// Report a duplicate-table conflict on CREATE TABLE.
    ConflictOnCreate,
    /// Fail the NOTIFY statement.
    FailNotify,
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
    executed: Mutex<Vec<Statement>>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` with `columns` and `rows` as already-committed state.
    pub fn seed(&self, table: &str, columns: &[&str], rows: &[&[(&str, &str)]]) {
        let table_rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(column, value)| (column.to_string(), Some(value.to_string())))
                    .collect()
            })
            .collect();
        self.state.lock().expect("state lock").tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|column| column.to_string()).collect(),
                rows: table_rows,
            },
        );
    }

    pub fn inject(&self, fault: Fault) {
        *self.fault.lock().expect("fault lock") = Some(fault);
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().expect("state lock").clone()
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.snapshot().tables.get(name).cloned()
    }

    /// Every statement executed so far, including those of rolled-back transactions.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().expect("executed lock").clone()
    }

    pub fn executed_kinds(&self) -> Vec<&'static str> {
        self.executed().iter().map(Statement::kind).collect()
    }

    pub fn begin(&self) -> MemorySession {
        MemorySession {
            staged: self.snapshot(),
            executed: Vec::new(),
            inserts: 0,
            fault: self.fault.lock().expect("fault lock").take(),
        }
    }

    pub fn commit(&self, session: MemorySession) {
        *self.state.lock().expect("state lock") = session.staged;
    }
}

#[async_trait]
impl DatasetSink for MemoryDatabase {
    async fn ingest(&self, dataset: &ValidatedDataset) -> Result<IngestOutcome, IngestError> {
        let channel = Identifier::parse(DEFAULT_NOTIFY_CHANNEL).expect("valid channel");
        let mut session = self.begin();
        let result = apply_dataset(&mut session, dataset, &channel).await;
        self.executed
            .lock()
            .expect("executed lock")
            .extend(session.executed.iter().cloned());
        if result.is_ok() {
            self.commit(session);
        }
        result
    }
}

/// Transaction over a private copy of the catalog.
pub struct MemorySession {
    staged: MemoryState,
    executed: Vec<Statement>,
    inserts: usize,
    fault: Option<Fault>,
}

impl MemorySession {
    fn table_mut(&mut self, table: &Identifier) -> Result<&mut MemoryTable, IngestError> {
        self.staged
            .tables
            .get_mut(table.as_str())
            .ok_or_else(|| IngestError::Internal(anyhow!("relation \"{table}\" does not exist")))
    }
}

#[async_trait]
impl SchemaSession for MemorySession {
    async fn table_exists(&mut self, table: &Identifier) -> Result<bool, IngestError> {
        Ok(self.staged.tables.contains_key(table.as_str()))
    }

    async fn existing_columns(
        &mut self,
        table: &Identifier,
    ) -> Result<BTreeSet<String>, IngestError> {
        Ok(self
            .staged
            .tables
            .get(table.as_str())
            .map(|stored| stored.columns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64, IngestError> {
        self.executed.push(statement.clone());
        match statement {
            Statement::CreateTable { table, columns } => {
                if self.fault == Some(Fault::ConflictOnCreate)
                    || self.staged.tables.contains_key(table.as_str())
                {
                    return Err(IngestError::Conflict {
                        message: format!("relation \"{table}\" already exists"),
                    });
                }
                self.staged.tables.insert(
                    table.as_str().to_string(),
                    MemoryTable {
                        columns: columns.iter().map(|c| c.as_str().to_string()).collect(),
                        rows: Vec::new(),
                    },
                );
                Ok(0)
            }
            Statement::AddColumn { table, column } => {
                let stored = self.table_mut(table)?;
                if column.as_str() == PRIMARY_KEY_COLUMN
                    || stored.columns.iter().any(|c| c == column.as_str())
                {
                    return Err(IngestError::Conflict {
                        message: format!("column \"{column}\" of relation \"{table}\" already exists"),
                    });
                }
                stored.columns.push(column.as_str().to_string());
                Ok(0)
            }
            Statement::InsertRow {
                table,
                columns,
                values,
            } => {
                self.inserts += 1;
                if self.fault == Some(Fault::FailInsertAt(self.inserts)) {
                    return Err(IngestError::Internal(anyhow!(
                        "injected failure on insert {}",
                        self.inserts
                    )));
                }
                let stored = self.table_mut(table)?;
                if let Some(unknown) = columns
                    .iter()
                    .find(|column| !stored.columns.iter().any(|c| c == column.as_str()))
                {
                    return Err(IngestError::Internal(anyhow!(
                        "column \"{unknown}\" of relation \"{table}\" does not exist"
                    )));
                }
                let row = columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| (column.as_str().to_string(), value.clone()))
                    .collect();
                stored.rows.push(row);
                Ok(1)
            }
            Statement::Notify { channel } => {
                if self.fault == Some(Fault::FailNotify) {
                    return Err(IngestError::Internal(anyhow!("injected notify failure")));
                }
                self.staged.notifications.push(channel.as_str().to_string());
                Ok(0)
            }
        }
    }
}

/// Reads `column` from `row`, treating absent columns as NULL.
pub fn cell<'a>(row: &'a MemoryRow, column: &str) -> Option<&'a str> {
    row.get(column).and_then(|value| value.as_deref())
}
