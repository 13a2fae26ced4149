//! Redb storage engine implementation.
//!
//! This module provides the `RedbEngine` type which implements the
//! `StorageEngine` trait using the Redb embedded database.

use std::path::Path;

use redb::Database;
use tracing::debug;

use crate::engine::{StorageEngine, StorageError};

use super::transaction::RedbTransaction;

/// Configuration options for the Redb storage engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedbConfig {
    /// Cache size in bytes.
    /// If not set, uses Redb's default.
    pub cache_size: Option<usize>,
}

impl RedbConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache size.
    #[must_use]
    pub const fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }
}

/// A storage engine backed by Redb.
///
/// Write transactions are serialized by Redb; read transactions see the last
/// committed snapshot and never block writers.
///
/// # Example
///
/// ```ignore
/// use strata_storage::backends::RedbEngine;
///
/// let engine = RedbEngine::open("state.redb")?;
///
/// let mut tx = engine.begin_write()?;
/// tx.put("state", b"person:1", b"{}")?;
/// tx.commit()?;
/// ```
pub struct RedbEngine {
    db: Database,
}

impl RedbEngine {
    /// Open or create a database at the given path with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_config(path, RedbConfig::default())
    }

    /// Open or create a database at the given path with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be opened or created.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: RedbConfig,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = builder(config).create(path).map_err(|e| StorageError::Open(e.to_string()))?;
        debug!(path = %path.display(), "opened redb database");

        Ok(Self { db })
    }

    /// Open an existing database at the given path, never creating one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no file exists at the path, and
    /// [`StorageError::Open`] if the file is not a readable database.
    pub fn open_existing(path: impl AsRef<Path>, config: RedbConfig) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StorageError::NotFound(format!("database {}", path.display())));
        }
        let db = builder(config).open(path).map_err(|e| StorageError::Open(e.to_string()))?;
        debug!(path = %path.display(), "opened existing redb database");

        Ok(Self { db })
    }

    /// Create an in-memory database.
    ///
    /// The database is lost when the engine is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(|e| StorageError::Open(e.to_string()))?;

        Ok(Self { db })
    }

    /// Get the underlying Redb database.
    pub const fn inner(&self) -> &Database {
        &self.db
    }
}

fn builder(config: RedbConfig) -> redb::Builder {
    let mut builder = Database::builder();
    if let Some(cache_size) = config.cache_size {
        builder.set_cache_size(cache_size);
    }
    builder
}

impl StorageEngine for RedbEngine {
    type Transaction<'a> = RedbTransaction;

    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let tx = self.db.begin_read().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(RedbTransaction::new_read(tx))
    }

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError> {
        let tx = self.db.begin_write().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(RedbTransaction::new_write(tx))
    }
}
