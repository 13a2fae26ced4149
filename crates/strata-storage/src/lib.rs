//! Strata Storage
//!
//! This crate provides the transactional key-value abstraction the strata
//! composite store is built on, plus the backends that implement it.
//!
//! # Overview
//!
//! The composite store only needs four primitives from its backend: point
//! reads, writes, deletes, and ordered range scans, all inside one logical
//! transaction with read-your-writes semantics. Those are captured by the
//! traits in [`engine`]:
//!
//! - [`StorageEngine`] - Opens read and write transactions
//! - [`Transaction`] - Get/put/delete/range inside one transaction
//! - [`Cursor`] - Ascending iteration over a key range
//!
//! # Error Handling
//!
//! All storage operations return [`StorageResult<T>`], an alias for
//! `Result<T, StorageError>`.
//!
//! # Example
//!
//! ```ignore
//! use strata_storage::{StorageEngine, Transaction};
//! use strata_storage::backends::RedbEngine;
//!
//! let engine = RedbEngine::open("state.redb")?;
//!
//! let mut tx = engine.begin_write()?;
//! tx.put("state", b"person:1", b"{}")?;
//! tx.commit()?;
//!
//! let tx = engine.begin_read()?;
//! assert!(tx.get("state", b"person:1")?.is_some());
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage engine traits and errors
//! - [`backends`] - Concrete backends (redb and in-memory)

#![deny(clippy::unwrap_used)]

pub mod backends;
pub mod engine;

pub use engine::{
    Cursor, CursorResult, KeyValue, StorageEngine, StorageError, StorageResult, Transaction,
};
