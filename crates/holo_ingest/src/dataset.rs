//! Structural validation of dataset ingestion payloads.
//!
//! A payload is a JSON object with exactly one key (the table name) whose value
//! is an array of flat row objects. Validation is pure: it runs before any
//! database I/O and either yields an immutable [`ValidatedDataset`] or the
//! first [`ValidationError`] found, checked in a fixed order.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::identifier::{Identifier, IdentifierError};

/// Synthetic auto-increment primary key added to every created table.
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// One validated row, keeping the key order of its JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    cells: Vec<(Identifier, Option<String>)>,
}

impl DatasetRow {
    /// Column names in the order they appeared in the row object.
    pub fn columns(&self) -> impl Iterator<Item = &Identifier> {
        self.cells.iter().map(|(column, _)| column)
    }

    /// Text values aligned with [`DatasetRow::columns`]; `None` is SQL NULL.
    pub fn values(&self) -> impl Iterator<Item = Option<&str>> {
        self.cells.iter().map(|(_, value)| value.as_deref())
    }

    /// Looks up the value stored for `column`.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.cells
            .iter()
            .find(|(name, _)| name.as_str() == column)
            .map(|(_, value)| value.as_deref())
    }
}

/// Payload that passed every structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDataset {
    table_name: Identifier,
    columns: Vec<Identifier>,
    rows: Vec<DatasetRow>,
}

impl ValidatedDataset {
    pub fn table_name(&self) -> &Identifier {
        &self.table_name
    }

    /// Columns in first-row order.
    pub fn columns(&self) -> &[Identifier] {
        &self.columns
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Requested column names as an order-insensitive set.
    pub fn column_set(&self) -> BTreeSet<String> {
        self.columns
            .iter()
            .map(|column| column.as_str().to_string())
            .collect()
    }
}

/// Categorized client-fault detected before touching the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload is not a JSON object.
    RequestNotObject,
    /// Payload object has no keys.
    EmptyRequest,
    /// Payload object names more than one table.
    MultipleTables { tables: Vec<String> },
    /// Table value is not an array.
    NotAnArray { table_name: String },
    InvalidTableName {
        name: String,
        reason: IdentifierError,
    },
    /// Row array has no elements.
    EmptyData { table_name: String },
    /// Row at 1-based index `row` is not an object.
    RowNotObject { row: usize },
    /// First row defines no columns.
    NoColumns { table_name: String },
    InvalidColumnName {
        name: String,
        reason: IdentifierError,
    },
    /// Column collides with the synthetic primary key.
    ReservedColumnName { name: String },
    /// Row at 1-based index `row` has a different key set than the first row.
    InconsistentColumns {
        row: usize,
        missing: BTreeSet<String>,
        extra: BTreeSet<String>,
    },
    /// Value at 1-based index `row` under `column` is an array or object.
    NonScalarValue { row: usize, column: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestNotObject => write!(f, "Request must be a JSON object"),
            Self::EmptyRequest => write!(f, "Request cannot be empty"),
            Self::MultipleTables { tables } => write!(
                f,
                "Request must contain exactly one table, found {}: {}",
                tables.len(),
                format_names(tables.iter())
            ),
            Self::NotAnArray { table_name } => {
                write!(f, "Value for '{table_name}' must be an array")
            }
            Self::InvalidTableName { name, reason } => write!(
                f,
                "Invalid table name '{name}' ({reason}). Use only alphanumeric characters and underscores."
            ),
            Self::EmptyData { table_name } => {
                write!(f, "Data array for '{table_name}' cannot be empty")
            }
            Self::RowNotObject { row } => write!(f, "Row {row} must be an object"),
            Self::NoColumns { table_name } => {
                write!(f, "Rows for '{table_name}' must define at least one column")
            }
            Self::InvalidColumnName { name, reason } => write!(
                f,
                "Invalid column name '{name}' ({reason}). Use only alphanumeric characters and underscores."
            ),
            Self::ReservedColumnName { name } => write!(
                f,
                "Column name '{name}' is reserved for the generated primary key"
            ),
            Self::InconsistentColumns {
                row,
                missing,
                extra,
            } => {
                let mut parts = Vec::new();
                if !missing.is_empty() {
                    parts.push(format!("missing columns: {}", format_names(missing.iter())));
                }
                if !extra.is_empty() {
                    parts.push(format!("extra columns: {}", format_names(extra.iter())));
                }
                write!(f, "Row {row} has inconsistent columns ({})", parts.join(", "))
            }
            Self::NonScalarValue { row, column } => write!(
                f,
                "Row {row} column '{column}' must be a scalar value, not an array or object"
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Renders names as `[a, b, c]`.
pub(crate) fn format_names<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let joined = names.map(String::as_str).collect::<Vec<_>>().join(", ");
    format!("[{joined}]")
}

/// Validates a raw JSON payload into a dataset ready for ingestion.
pub fn validate(payload: &Value) -> Result<ValidatedDataset, ValidationError> {
    let request = payload
        .as_object()
        .ok_or(ValidationError::RequestNotObject)?;
    let (raw_table_name, table_value) = single_table(request)?;

    let raw_rows = table_value
        .as_array()
        .ok_or_else(|| ValidationError::NotAnArray {
            table_name: raw_table_name.to_string(),
        })?;

    let table_name =
        Identifier::parse(raw_table_name).map_err(|reason| ValidationError::InvalidTableName {
            name: raw_table_name.to_string(),
            reason,
        })?;

    if raw_rows.is_empty() {
        return Err(ValidationError::EmptyData {
            table_name: raw_table_name.to_string(),
        });
    }

    let objects = raw_rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            row.as_object()
                .ok_or(ValidationError::RowNotObject { row: idx + 1 })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let columns = derive_columns(raw_table_name, objects[0])?;
    check_consistency(&columns, &objects)?;

    let rows = objects
        .iter()
        .enumerate()
        .map(|(idx, object)| convert_row(idx + 1, &columns, object))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedDataset {
        table_name,
        columns,
        rows,
    })
}

/// Extracts the single `(table name, rows value)` entry of the request.
fn single_table(request: &Map<String, Value>) -> Result<(&str, &Value), ValidationError> {
    let mut entries = request.iter();
    let (name, value) = entries.next().ok_or(ValidationError::EmptyRequest)?;
    if entries.next().is_some() {
        let mut tables = request.keys().cloned().collect::<Vec<_>>();
        tables.sort();
        return Err(ValidationError::MultipleTables { tables });
    }
    Ok((name.as_str(), value))
}

/// Derives the ordered column list from the first row.
fn derive_columns(
    table_name: &str,
    first_row: &Map<String, Value>,
) -> Result<Vec<Identifier>, ValidationError> {
    if first_row.is_empty() {
        return Err(ValidationError::NoColumns {
            table_name: table_name.to_string(),
        });
    }
    let mut columns = Vec::with_capacity(first_row.len());
    for name in first_row.keys() {
        let column =
            Identifier::parse(name).map_err(|reason| ValidationError::InvalidColumnName {
                name: name.clone(),
                reason,
            })?;
        if column.as_str() == PRIMARY_KEY_COLUMN {
            return Err(ValidationError::ReservedColumnName { name: name.clone() });
        }
        columns.push(column);
    }
    Ok(columns)
}

/// Requires every row to carry exactly the first row's key set.
fn check_consistency(
    columns: &[Identifier],
    objects: &[&Map<String, Value>],
) -> Result<(), ValidationError> {
    let expected = columns
        .iter()
        .map(|column| column.as_str())
        .collect::<BTreeSet<_>>();
    for (idx, object) in objects.iter().enumerate().skip(1) {
        let actual = object.keys().map(String::as_str).collect::<BTreeSet<_>>();
        if actual != expected {
            return Err(ValidationError::InconsistentColumns {
                row: idx + 1,
                missing: expected
                    .difference(&actual)
                    .map(|name| name.to_string())
                    .collect(),
                extra: actual
                    .difference(&expected)
                    .map(|name| name.to_string())
                    .collect(),
            });
        }
    }
    Ok(())
}

fn convert_row(
    row: usize,
    columns: &[Identifier],
    object: &Map<String, Value>,
) -> Result<DatasetRow, ValidationError> {
    let mut cells = Vec::with_capacity(object.len());
    for (key, value) in object {
        // Key sets were already checked equal to `columns`.
        let column = columns
            .iter()
            .find(|column| column.as_str() == key)
            .cloned()
            .ok_or_else(|| ValidationError::InconsistentColumns {
                row,
                missing: BTreeSet::new(),
                extra: BTreeSet::from([key.clone()]),
            })?;
        let text = scalar_text(value).map_err(|()| ValidationError::NonScalarValue {
            row,
            column: key.clone(),
        })?;
        cells.push((column, text));
    }
    Ok(DatasetRow { cells })
}

/// Text form stored for a scalar JSON value; `Err` for arrays and objects.
fn scalar_text(value: &Value) -> Result<Option<String>, ()> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Array(_) | Value::Object(_) => Err(()),
    }
}
