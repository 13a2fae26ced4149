//! Strata
//!
//! A composite entity store over an ordered key-value backend.
//!
//! # Overview
//!
//! A composite is a domain value split across several rows of one backend
//! table: a root row, a witness row recording that the composite exists, one
//! row per optional singleton member, and one row per item of each collection
//! member. Because every row key extends the composite's identity key, a
//! single range scan reads a whole composite back, and a scan over a schema's
//! base name walks all composites in identity order.
//!
//! - [`Schema`], [`Singleton`] and [`Collection`] describe how a type maps
//!   onto rows
//! - [`CompositeStore`] writes, reads, deletes and scans composites inside a
//!   caller-owned [`Transaction`]
//! - [`Codec`] is the value pipeline: a [`Marshaling`] stage followed by a
//!   [`Filtering`] stage such as [`GzipFiltering`]
//!
//! Reads tolerate damaged member rows: a row that fails to decode is left out
//! of the value and reported in [`Composite::member_errors`].
//!
//! # Example
//!
//! ```ignore
//! use strata::backends::MemoryEngine;
//! use strata::{CompositeStore, StorageEngine, Transaction};
//!
//! let engine = MemoryEngine::new();
//! let store = CompositeStore::new();
//!
//! let mut tx = engine.begin_write()?;
//! store.put_composite::<PersonSchema>(&mut tx, &person)?;
//! tx.commit()?;
//!
//! let tx = engine.begin_read()?;
//! let composite = store.get_composite::<PersonSchema>(&tx, &person.id)?;
//! assert!(composite.is_some_and(|c| c.is_complete()));
//! ```
//!
//! # Modules
//!
//! - [`schema`] - Schema and member descriptors
//! - [`store`] - The composite store engine
//! - [`types`] - Entries, items, ranges and read results
//! - [`config`] - Store configuration
//! - [`error`] - Error types

#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod types;

pub use config::{StoreConfig, DEFAULT_TABLE};
pub use error::{StoreError, StoreResult};
pub use schema::{Collection, MemberVisitor, RootPolicy, Schema, Singleton, ValueOf};
pub use store::{CompositeStore, IdOf};
pub use types::{Composite, Entry, Item, MemberError, MemberKind, Range};

pub use strata_core::{
    BincodeMarshaling, Codec, CoreError, Filtering, GzipFiltering, Identifier, JsonMarshaling,
    Key, KeyError, Marshaling, NoFiltering, Separator, Tag,
};
pub use strata_storage::{backends, Cursor, StorageEngine, StorageError, Transaction};
