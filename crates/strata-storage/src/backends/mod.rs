//! Storage backend implementations.
//!
//! # Available Backends
//!
//! - [`redb`] - Pure-Rust embedded database with ACID transactions (on disk or in memory)
//! - [`memory`] - Ordered in-memory map with snapshot reads, for tests and ephemeral state

pub mod memory;
pub mod redb;

pub use self::memory::{MemoryCursor, MemoryEngine, MemoryTransaction};
pub use self::redb::{RedbConfig, RedbCursor, RedbEngine, RedbTransaction};
