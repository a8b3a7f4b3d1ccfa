use sqlx::error::ErrorKind;
use thiserror::Error;

/// Failures raised by the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{table} '{key}' does not exist")]
    NotFound { table: &'static str, key: String },

    #[error("{table} '{key}' already exists")]
    Duplicate { table: &'static str, key: String },

    /// Delete refused because other records still point at this one
    #[error("{table} '{key}' is still referenced by {referenced_by}")]
    Protected {
        table: &'static str,
        key: String,
        referenced_by: &'static str,
    },

    /// A write pointed at a related record that does not exist (any more)
    #[error("{table} refers to a {references} that does not exist")]
    MissingReference {
        table: &'static str,
        references: &'static str,
    },

    /// A stored row breaks an invariant of its record type
    #[error("{table} '{key}' is malformed: {reason}")]
    Corrupt {
        table: &'static str,
        key: String,
        reason: String,
    },

    #[error("invalid page: {reason}")]
    InvalidPage { reason: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(table: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            table,
            key: key.to_string(),
        }
    }

    pub fn protected(table: &'static str, key: impl ToString, referenced_by: &'static str) -> Self {
        Self::Protected {
            table,
            key: key.to_string(),
            referenced_by,
        }
    }

    pub fn corrupt(table: &'static str, key: impl ToString, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            table,
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Schema constraint a failed statement ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

pub fn violation(err: &sqlx::Error) -> Option<Violation> {
    match err.as_database_error()?.kind() {
        ErrorKind::UniqueViolation => Some(Violation::Unique),
        ErrorKind::ForeignKeyViolation => Some(Violation::ForeignKey),
        ErrorKind::CheckViolation => Some(Violation::Check),
        ErrorKind::NotNullViolation => Some(Violation::NotNull),
        _ => None,
    }
}
