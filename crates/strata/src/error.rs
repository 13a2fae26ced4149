//! Error types for the composite store.
//!
//! Only failures that make an operation meaningless are errors. A missing
//! composite or value is `Ok(None)`/`Ok(false)`, and a member row that fails
//! to decode during a composite read is reported as a
//! [`MemberError`](crate::MemberError) on the result instead.

use std::fmt::Display;

use strata_core::{CoreError, KeyError};
use strata_storage::StorageError;
use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A key could not be built, encoded or parsed.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// A value could not be marshaled or unmarshaled.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Stored bytes could not be filtered or unfiltered.
    #[error("filter error: {0}")]
    Filter(String),

    /// The backend transaction failed.
    #[error("backend {operation} failed for key {key}: {source}")]
    Backend {
        /// The backend operation (`get`, `put`, `delete`, `scan`).
        operation: &'static str,
        /// The key, or the prefix of the scanned range.
        key: String,
        /// The backend error.
        source: StorageError,
    },
}

impl StoreError {
    pub(crate) fn backend(operation: &'static str, key: &impl Display, source: StorageError) -> Self {
        Self::Backend { operation, key: key.to_string(), source }
    }

    /// The backend error, if this is a backend failure.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Backend { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether retrying the whole transaction may succeed.
    pub fn is_recoverable(&self) -> bool {
        self.storage_error().is_some_and(StorageError::is_recoverable)
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Key(e) => Self::Key(e),
            CoreError::Encoding(msg) => Self::Encoding(msg),
            CoreError::Filter(msg) => Self::Filter(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn core_errors_keep_their_category() {
        assert!(matches!(StoreError::from(CoreError::Encoding("x".into())), StoreError::Encoding(_)));
        assert!(matches!(StoreError::from(CoreError::Filter("x".into())), StoreError::Filter(_)));
        assert!(matches!(
            StoreError::from(CoreError::Key(KeyError::ReservedTag)),
            StoreError::Key(KeyError::ReservedTag)
        ));
    }

    #[test]
    fn backend_errors_carry_key_and_source() {
        let err = StoreError::backend("put", &"person:1#email", StorageError::ReadOnly);
        assert_eq!(
            err.to_string(),
            "backend put failed for key person:1#email: cannot write in a read-only transaction"
        );
        assert!(err.source().is_some());
        assert!(matches!(err.storage_error(), Some(StorageError::ReadOnly)));
        assert!(!err.is_recoverable());

        let conflict = StoreError::backend("get", &"k", StorageError::Conflict("busy".into()));
        assert!(conflict.is_recoverable());
    }
}
