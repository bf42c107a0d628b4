//! Error taxonomy returned by the ingestion engine.

use std::collections::BTreeSet;
use std::fmt;

use crate::dataset::{format_names, ValidationError};

/// Coarse error class used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Payload must be fixed by the caller.
    ClientFault,
    /// Lost a race with a concurrent schema change; the caller may retry.
    Conflict,
    /// Infrastructure failure with no caller-actionable detail.
    Internal,
}

/// Failure of one ingestion call. Every variant implies a full rollback.
#[derive(Debug)]
pub enum IngestError {
    Validation(ValidationError),
    /// Existing table and request share no column.
    NoSharedColumns {
        table_name: String,
        existing: BTreeSet<String>,
        requested: BTreeSet<String>,
    },
    /// Concurrent DDL on the same table won; nothing was applied.
    Conflict { message: String },
    Internal(anyhow::Error),
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::NoSharedColumns { .. } => ErrorCategory::ClientFault,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_client_fault(&self) -> bool {
        self.category() == ErrorCategory::ClientFault
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NoSharedColumns {
                table_name,
                existing,
                requested,
            } => write!(
                f,
                "Column mismatch. No shared columns with existing table '{table_name}'. Existing columns: {}, New columns: {}",
                format_names(existing.iter()),
                format_names(requested.iter())
            ),
            Self::Conflict { message } => write!(f, "Concurrent schema change conflict: {message}"),
            Self::Internal(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Internal(err) => Some(&**err),
            Self::NoSharedColumns { .. } | Self::Conflict { .. } => None,
        }
    }
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<anyhow::Error> for IngestError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_shared_columns_message_lists_sorted_sets() {
        let err = IngestError::NoSharedColumns {
            table_name: "users".to_string(),
            existing: BTreeSet::from(["name".to_string(), "age".to_string()]),
            requested: BTreeSet::from(["email".to_string()]),
        };
        assert_eq!(err.category(), ErrorCategory::ClientFault);
        assert_eq!(
            err.to_string(),
            "Column mismatch. No shared columns with existing table 'users'. Existing columns: [age, name], New columns: [email]"
        );
    }

    #[test]
    fn categories_separate_client_conflict_and_internal_failures() {
        assert!(IngestError::from(ValidationError::EmptyRequest).is_client_fault());
        assert_eq!(
            IngestError::Conflict {
                message: "duplicate table".to_string()
            }
            .category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            IngestError::from(anyhow::anyhow!("connection refused")).category(),
            ErrorCategory::Internal
        );
    }
}
