//! Storage error types.

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened.
    #[error("failed to open database: {0}")]
    Open(String),

    /// A database or table does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transaction could not be started, committed or rolled back.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A concurrent transaction conflicted with this one.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// A write was attempted on a read-only transaction.
    #[error("cannot write in a read-only transaction")]
    ReadOnly,

    /// The backend reported an internal failure.
    #[error("internal storage error: {0}")]
    Internal(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether retrying the whole logical transaction may succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether the error reports a missing database or table.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
