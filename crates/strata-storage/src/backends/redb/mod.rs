//! Redb storage backend.
//!
//! All logical tables share one physical redb table; logical table names are
//! encoded as a key prefix (see [`tables`]).

mod engine;
pub mod tables;
mod transaction;

pub use engine::{RedbConfig, RedbEngine};
pub use transaction::{RedbCursor, RedbTransaction};
