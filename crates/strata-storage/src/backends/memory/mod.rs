//! In-memory storage backend.
//!
//! Committed state is an immutable snapshot behind an `Arc`, with each table
//! behind its own `Arc`. Read transactions clone the snapshot `Arc` and never
//! block. A write transaction takes the single writer lock and records its
//! writes in a private overlay over the snapshot. Commit applies the overlay
//! in place, copying only the tables it touches that a reader still holds.
//! Dropping a write transaction discards its overlay.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};

use crate::engine::{
    is_valid_range, Cursor, CursorResult, KeyValue, StorageEngine, StorageError, Transaction,
};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;
type Tables = BTreeMap<String, Arc<Table>>;
/// Pending writes per table; `None` marks a deleted key.
type Overlay = BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

/// A storage engine keeping all tables in ordered in-memory maps.
///
/// # Example
///
/// ```ignore
/// use strata_storage::backends::MemoryEngine;
///
/// let engine = MemoryEngine::new();
/// let mut tx = engine.begin_write()?;
/// tx.put("state", b"k", b"v")?;
/// tx.commit()?;
/// ```
#[derive(Default)]
pub struct MemoryEngine {
    committed: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
}

impl MemoryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a write transaction without waiting for the writer lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if another write transaction is
    /// open. Retrying once it finishes may succeed.
    pub fn try_begin_write(&self) -> Result<MemoryTransaction<'_>, StorageError> {
        let lock = match self.writer.try_lock() {
            Ok(lock) => lock,
            Err(TryLockError::WouldBlock) => {
                return Err(StorageError::Conflict("another write transaction is open".into()))
            }
            Err(TryLockError::Poisoned(e)) => {
                return Err(StorageError::Transaction(format!("lock poisoned: {e}")))
            }
        };
        self.write_transaction(lock)
    }

    fn write_transaction<'a>(
        &'a self,
        lock: MutexGuard<'a, ()>,
    ) -> Result<MemoryTransaction<'a>, StorageError> {
        Ok(MemoryTransaction::Write {
            engine: self,
            base: self.snapshot()?,
            overlay: Overlay::new(),
            _lock: lock,
        })
    }

    fn snapshot(&self) -> Result<Arc<Tables>, StorageError> {
        self.committed
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|e| StorageError::Transaction(format!("lock poisoned: {e}")))
    }

    fn apply(&self, overlay: Overlay) -> Result<(), StorageError> {
        let mut guard = self
            .committed
            .write()
            .map_err(|e| StorageError::Transaction(format!("lock poisoned: {e}")))?;
        let tables = Arc::make_mut(&mut *guard);
        for (name, writes) in overlay {
            let table = Arc::make_mut(tables.entry(name).or_default());
            for (key, value) in writes {
                match value {
                    Some(value) => {
                        table.insert(key, value);
                    }
                    None => {
                        table.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }
}

impl StorageEngine for MemoryEngine {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError> {
        Ok(MemoryTransaction::Read { snapshot: self.snapshot()? })
    }

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let lock = self
            .writer
            .lock()
            .map_err(|e| StorageError::Transaction(format!("lock poisoned: {e}")))?;
        self.write_transaction(lock)
    }
}

/// A transaction over a [`MemoryEngine`].
pub enum MemoryTransaction<'a> {
    /// A read-only view of the last committed snapshot.
    Read {
        /// The snapshot being read.
        snapshot: Arc<Tables>,
    },
    /// A read-write transaction holding the writer lock.
    Write {
        /// The engine to apply the overlay to on commit.
        engine: &'a MemoryEngine,
        /// The snapshot committed when the transaction began.
        base: Arc<Tables>,
        /// Pending writes, read in preference to `base`.
        overlay: Overlay,
        /// Held until commit, rollback, or drop.
        _lock: MutexGuard<'a, ()>,
    },
}

impl MemoryTransaction<'_> {
    fn base(&self) -> &Tables {
        match self {
            Self::Read { snapshot } => snapshot,
            Self::Write { base, .. } => base,
        }
    }

    fn pending(&self, table: &str) -> Option<&BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
        match self {
            Self::Read { .. } => None,
            Self::Write { overlay, .. } => overlay.get(table),
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    type Cursor<'c>
        = MemoryCursor
    where
        Self: 'c;

    fn get(&self, table: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        if let Some(pending) = self.pending(table).and_then(|t| t.get(key)) {
            return Ok(pending.clone());
        }
        Ok(self.base().get(table).and_then(|t| t.get(key)).cloned())
    }

    fn put(&mut self, table: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        match self {
            Self::Read { .. } => Err(StorageError::ReadOnly),
            Self::Write { overlay, .. } => {
                overlay
                    .entry(table.to_string())
                    .or_default()
                    .insert(key.to_vec(), Some(value.to_vec()));
                Ok(())
            }
        }
    }

    fn delete(&mut self, table: &str, key: &[u8]) -> Result<bool, StorageError> {
        match self {
            Self::Read { .. } => Err(StorageError::ReadOnly),
            Self::Write { base, overlay, .. } => {
                let pending = overlay.entry(table.to_string()).or_default();
                let existed = match pending.get(key) {
                    Some(value) => value.is_some(),
                    None => base.get(table).is_some_and(|t| t.contains_key(key)),
                };
                pending.insert(key.to_vec(), None);
                Ok(existed)
            }
        }
    }

    fn range(
        &self,
        table: &str,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<Self::Cursor<'_>, StorageError> {
        if !is_valid_range(start, end) {
            return Ok(MemoryCursor::new(Vec::new()));
        }
        let committed =
            self.base().get(table).into_iter().flat_map(|t| t.range::<[u8], _>((start, end)));
        let entries = match self.pending(table) {
            None => committed.map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(pending) => {
                let mut merged: Table =
                    committed.map(|(k, v)| (k.clone(), v.clone())).collect();
                for (key, value) in pending.range::<[u8], _>((start, end)) {
                    match value {
                        Some(value) => {
                            merged.insert(key.clone(), value.clone());
                        }
                        None => {
                            merged.remove(key);
                        }
                    }
                }
                merged.into_iter().collect()
            }
        };
        Ok(MemoryCursor::new(entries))
    }

    fn commit(self) -> Result<(), StorageError> {
        match self {
            Self::Read { .. } => Ok(()),
            Self::Write { engine, base, overlay, _lock } => {
                // release the snapshot so untouched tables are not copied
                drop(base);
                engine.apply(overlay)
            }
        }
    }

    fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

/// A cursor over a materialized range of a [`MemoryTransaction`].
pub struct MemoryCursor {
    entries: Vec<KeyValue>,
    position: Option<usize>,
    started: bool,
}

impl MemoryCursor {
    fn new(entries: Vec<KeyValue>) -> Self {
        Self { entries, position: None, started: false }
    }

    fn current_owned(&self) -> Option<KeyValue> {
        self.position.and_then(|pos| self.entries.get(pos).cloned())
    }
}

impl Cursor for MemoryCursor {
    fn seek(&mut self, key: &[u8]) -> CursorResult {
        let pos = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        self.started = true;
        self.position = (pos < self.entries.len()).then_some(pos);
        Ok(self.current_owned())
    }

    fn next(&mut self) -> CursorResult {
        let next = match self.position {
            Some(pos) => pos + 1,
            None if self.started => return Ok(None),
            None => 0,
        };
        self.started = true;
        self.position = (next < self.entries.len()).then_some(next);
        Ok(self.current_owned())
    }

    fn current(&self) -> Option<(&[u8], &[u8])> {
        self.position
            .and_then(|pos| self.entries.get(pos))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}
