//! Core storage engine traits.
//!
//! This module defines the fundamental traits for storage backends:
//!
//! - [`StorageEngine`] - The main entry point for storage operations
//! - [`Transaction`] - Read/write operations inside one logical transaction
//! - [`Cursor`] - Ordered iteration over key-value pairs
//!
//! Keys are compared as raw bytes. Every backend must yield range results in
//! ascending byte order, since the composite store relies on that order to
//! group the rows of one composite together.

use std::ops::Bound;
use std::sync::Arc;

use super::StorageError;

/// A key-value pair returned by cursor operations.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Result type for cursor operations that return a key-value pair.
pub type CursorResult = Result<Option<KeyValue>, StorageError>;

/// A storage engine that provides transactional key-value operations.
///
/// Implementations must be thread-safe (`Send + Sync`): independent callers
/// may open transactions concurrently, and conflict resolution between them
/// is the engine's responsibility.
///
/// # Example
///
/// ```ignore
/// use strata_storage::{StorageEngine, StorageError, Transaction};
///
/// fn example<E: StorageEngine>(engine: &E) -> Result<(), StorageError> {
///     let mut tx = engine.begin_write()?;
///     tx.put("state", b"key", b"value")?;
///     tx.commit()?;
///
///     let tx = engine.begin_read()?;
///     let value = tx.get("state", b"key")?;
///     assert_eq!(value, Some(b"value".to_vec()));
///     Ok(())
/// }
/// ```
pub trait StorageEngine: Send + Sync {
    /// The transaction type for this engine.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Begin a read-only transaction.
    ///
    /// Read transactions observe a consistent snapshot of the database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the transaction cannot be started.
    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError>;

    /// Begin a read-write transaction.
    ///
    /// Depending on the backend, write transactions may be serialized.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the transaction cannot be started.
    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError>;

    /// Flush any buffered data to durable storage.
    ///
    /// The default implementation does nothing, as most backends handle
    /// durability on commit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the flush fails.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// A transaction over one or more logical tables.
///
/// Reads inside a write transaction observe the transaction's own pending
/// writes. Write transactions must be explicitly committed; dropping without
/// committing rolls back.
pub trait Transaction {
    /// The cursor type for range iteration.
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    /// Get a value by key from a table.
    ///
    /// Returns `Ok(None)` if the key (or the whole table) does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the backend read fails.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Put a key-value pair into a table, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] on a read-only transaction, or
    /// [`StorageError::Internal`] if the write fails.
    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Delete a key from a table.
    ///
    /// Returns `Ok(true)` if the key was deleted, `Ok(false)` if it didn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadOnly`] on a read-only transaction, or
    /// [`StorageError::Internal`] if the delete fails.
    fn delete(&mut self, table: &str, key: &[u8]) -> Result<bool, StorageError>;

    /// Create a cursor over a range of keys in a table.
    ///
    /// The cursor yields entries in ascending byte order. It holds backend
    /// resources until dropped.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use std::ops::Bound;
    ///
    /// // Scan keys from "a" (inclusive) to "z" (exclusive)
    /// let mut cursor = tx.range(
    ///     "state",
    ///     Bound::Included(b"a".as_slice()),
    ///     Bound::Excluded(b"z".as_slice()),
    /// )?;
    /// while let Some((key, value)) = cursor.next()? {
    ///     // ...
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the backend cannot open the range.
    fn range(
        &self,
        table: &str,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<Self::Cursor<'_>, StorageError>;

    /// Commit the transaction, making all changes durable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the commit fails.
    fn commit(self) -> Result<(), StorageError>;

    /// Rollback the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the rollback fails.
    fn rollback(self) -> Result<(), StorageError>;

    /// Check if this is a read-only transaction.
    fn is_read_only(&self) -> bool;
}

/// A forward cursor over key-value pairs.
///
/// ```ignore
/// let mut cursor = tx.range("state", start, end)?;
/// while let Some((key, value)) = cursor.next()? {
///     // Process key-value pair
/// }
/// ```
pub trait Cursor {
    /// Position the cursor at the first key greater than or equal to `key`
    /// and return that entry.
    ///
    /// Keys outside the cursor's range are never returned.
    fn seek(&mut self, key: &[u8]) -> CursorResult;

    /// Move to the next key-value pair.
    ///
    /// An unpositioned cursor moves to the first entry of its range. Returns
    /// `None` once the range is exhausted.
    fn next(&mut self) -> CursorResult;

    /// Get the current key-value pair without advancing.
    ///
    /// Returns `None` before the first call to `seek`/`next`, or after the
    /// range is exhausted.
    fn current(&self) -> Option<(&[u8], &[u8])>;
}

/// Implement `StorageEngine` for `Arc<E>` to allow shared ownership of engines.
impl<E: StorageEngine> StorageEngine for Arc<E> {
    type Transaction<'a>
        = E::Transaction<'a>
    where
        Self: 'a;

    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError> {
        (**self).begin_read()
    }

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError> {
        (**self).begin_write()
    }

    fn flush(&self) -> Result<(), StorageError> {
        (**self).flush()
    }
}

/// Whether a `(start, end)` bound pair describes a non-empty byte range.
///
/// Backends use this before handing the bounds to ordered maps that reject
/// inverted ranges.
#[must_use]
pub fn is_valid_range(start: Bound<&[u8]>, end: Bound<&[u8]>) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s <= e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e)) => s < e,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_range_bounds() {
        let a: &[u8] = b"a";
        let b: &[u8] = b"b";
        assert!(is_valid_range(Bound::Included(a), Bound::Excluded(b)));
        assert!(is_valid_range(Bound::Included(a), Bound::Included(a)));
        assert!(!is_valid_range(Bound::Included(a), Bound::Excluded(a)));
        assert!(!is_valid_range(Bound::Excluded(a), Bound::Included(a)));
        assert!(!is_valid_range(Bound::Included(b), Bound::Excluded(a)));
        assert!(is_valid_range(Bound::Unbounded, Bound::Excluded(a)));
        assert!(is_valid_range(Bound::Included(b), Bound::Unbounded));
    }
}
