//! Redb transaction implementation.
//!
//! This module provides the `RedbTransaction` type which implements the
//! `Transaction` trait for both read-only and read-write transactions.
//!
//! # Memory-Efficient Cursors
//!
//! Cursors stream the range in batches (default 1000 entries) instead of
//! materializing it, fetching the next batch on demand as the cursor
//! advances. Each batch re-opens the physical table, so a write transaction
//! never keeps the table open between cursor steps.

use std::ops::Bound;

use redb::{ReadTransaction, ReadableTable, WriteTransaction};

use crate::engine::{is_valid_range, Cursor, CursorResult, KeyValue, StorageError, Transaction};

use super::tables::{decode_key, encode_key, table_end_key, table_start_key, DATA_TABLE};

/// Default batch size for cursor operations.
const DEFAULT_BATCH_SIZE: usize = 1000;

/// A transaction for the Redb storage engine.
///
/// Boxing the `WriteTransaction` would add an indirection to every
/// operation on a short-lived value, hence the lint allowance.
#[allow(clippy::large_enum_variant)]
pub enum RedbTransaction {
    /// A read-only transaction.
    Read(ReadTransaction),
    /// A read-write transaction.
    Write(WriteTransaction),
}

impl RedbTransaction {
    /// Create a new read-only transaction.
    pub const fn new_read(tx: ReadTransaction) -> Self {
        Self::Read(tx)
    }

    /// Create a new read-write transaction.
    pub const fn new_write(tx: WriteTransaction) -> Self {
        Self::Write(tx)
    }

    /// Fetch up to `limit` entries of `table` between the logical bounds.
    fn fetch_batch(
        &self,
        table: &str,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        limit: usize,
    ) -> Result<Vec<KeyValue>, StorageError> {
        let lower = match start {
            Bound::Included(k) => Bound::Included(encode_key(table, k)),
            Bound::Excluded(k) => Bound::Excluded(encode_key(table, k)),
            Bound::Unbounded => Bound::Included(table_start_key(table)),
        };
        let upper = match end {
            Bound::Included(k) => Bound::Included(encode_key(table, k)),
            Bound::Excluded(k) => Bound::Excluded(encode_key(table, k)),
            Bound::Unbounded => Bound::Excluded(table_end_key(table)),
        };
        let (lower, upper) = (borrow_bound(&lower), borrow_bound(&upper));
        if !is_valid_range(lower, upper) {
            return Ok(Vec::new());
        }

        match self {
            Self::Read(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => collect_range(&t, lower, upper, limit),
                // No data table means no data, which is not an error
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
                Err(e) => Err(internal(e)),
            },
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE).map_err(internal)?;
                collect_range(&t, lower, upper, limit)
            }
        }
    }
}

impl Transaction for RedbTransaction {
    type Cursor<'a>
        = RedbCursor<'a>
    where
        Self: 'a;

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let encoded_key = encode_key(table, key);

        match self {
            Self::Read(tx) => match tx.open_table(DATA_TABLE) {
                Ok(t) => read_value(&t, &encoded_key),
                Err(redb::TableError::TableDoesNotExist(_)) => Ok(None),
                Err(e) => Err(internal(e)),
            },
            Self::Write(tx) => {
                let t = tx.open_table(DATA_TABLE).map_err(internal)?;
                read_value(&t, &encoded_key)
            }
        }
    }

    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly),
            Self::Write(tx) => {
                let encoded_key = encode_key(table, key);
                let mut t = tx.open_table(DATA_TABLE).map_err(internal)?;
                t.insert(encoded_key.as_slice(), value).map_err(internal)?;
                Ok(())
            }
        }
    }

    fn delete(&mut self, table: &str, key: &[u8]) -> Result<bool, StorageError> {
        match self {
            Self::Read(_) => Err(StorageError::ReadOnly),
            Self::Write(tx) => {
                let encoded_key = encode_key(table, key);
                let mut t = tx.open_table(DATA_TABLE).map_err(internal)?;
                let removed = t.remove(encoded_key.as_slice()).map_err(internal)?;
                Ok(removed.is_some())
            }
        }
    }

    fn range(
        &self,
        table: &str,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<Self::Cursor<'_>, StorageError> {
        Ok(RedbCursor::new(self, table, start, end, DEFAULT_BATCH_SIZE))
    }

    fn commit(self) -> Result<(), StorageError> {
        match self {
            // Read transactions don't need explicit commit
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.commit().map_err(|e| StorageError::Transaction(e.to_string())),
        }
    }

    fn rollback(self) -> Result<(), StorageError> {
        match self {
            Self::Read(_) => Ok(()),
            Self::Write(tx) => tx.abort().map_err(|e| StorageError::Transaction(e.to_string())),
        }
    }

    fn is_read_only(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}

fn internal(e: impl std::fmt::Display) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn borrow_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn owned_bound(bound: Bound<&[u8]>) -> Bound<Vec<u8>> {
    match bound {
        Bound::Included(k) => Bound::Included(k.to_vec()),
        Bound::Excluded(k) => Bound::Excluded(k.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn read_value<T>(table: &T, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table.get(key).map_err(internal)?.map(|v| v.value().to_vec()))
}

fn collect_range<T>(
    table: &T,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    limit: usize,
) -> Result<Vec<KeyValue>, StorageError>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut entries = Vec::with_capacity(limit.min(1024));
    for result in table.range::<&[u8]>((lower, upper)).map_err(internal)? {
        if entries.len() >= limit {
            break;
        }
        let (k, v) = result.map_err(internal)?;
        if let Some((_, key)) = decode_key(k.value()) {
            entries.push((key.to_vec(), v.value().to_vec()));
        }
    }
    Ok(entries)
}

/// A forward cursor over a key range of one logical table.
///
/// At any time the cursor holds at most `batch_size` entries in memory.
pub struct RedbCursor<'a> {
    tx: &'a RedbTransaction,
    table: String,
    start: Bound<Vec<u8>>,
    end: Bound<Vec<u8>>,
    batch: Vec<KeyValue>,
    position: Option<usize>,
    batch_size: usize,
    started: bool,
}

impl<'a> RedbCursor<'a> {
    /// Create a new unpositioned cursor.
    pub fn new(
        tx: &'a RedbTransaction,
        table: &str,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        batch_size: usize,
    ) -> Self {
        Self {
            tx,
            table: table.to_string(),
            start: owned_bound(start),
            end: owned_bound(end),
            batch: Vec::new(),
            position: None,
            batch_size: batch_size.max(1),
            started: false,
        }
    }

    fn fetch(&self, start: Bound<&[u8]>) -> Result<Vec<KeyValue>, StorageError> {
        self.tx.fetch_batch(&self.table, start, borrow_bound(&self.end), self.batch_size)
    }

    /// Whether the range may continue past the current batch.
    fn has_more(&self) -> bool {
        self.batch.len() >= self.batch_size
    }

    fn current_owned(&self) -> Option<KeyValue> {
        self.position.and_then(|pos| self.batch.get(pos).cloned())
    }
}

impl Cursor for RedbCursor<'_> {
    fn seek(&mut self, key: &[u8]) -> CursorResult {
        let from = match &self.start {
            Bound::Included(s) if s.as_slice() > key => Bound::Included(s.clone()),
            Bound::Excluded(s) if s.as_slice() >= key => Bound::Excluded(s.clone()),
            _ => Bound::Included(key.to_vec()),
        };
        self.batch = self.fetch(borrow_bound(&from))?;
        self.started = true;
        self.position = if self.batch.is_empty() { None } else { Some(0) };
        Ok(self.current_owned())
    }

    fn next(&mut self) -> CursorResult {
        let next = match self.position {
            Some(pos) => pos + 1,
            // Exhausted
            None if self.started => return Ok(None),
            None => {
                self.batch = self.fetch(borrow_bound(&self.start))?;
                self.started = true;
                0
            }
        };

        if next < self.batch.len() {
            self.position = Some(next);
        } else if self.has_more() {
            let after = self.batch.last().map(|(k, _)| k.clone()).unwrap_or_default();
            self.batch = self.fetch(Bound::Excluded(after.as_slice()))?;
            self.position = if self.batch.is_empty() { None } else { Some(0) };
        } else {
            self.position = None;
        }
        Ok(self.current_owned())
    }

    fn current(&self) -> Option<(&[u8], &[u8])> {
        self.position
            .and_then(|pos| self.batch.get(pos))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}
