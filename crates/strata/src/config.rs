//! Store configuration.

use serde::{Deserialize, Serialize};
use strata_core::Separator;

/// Default logical table holding every row of a store.
pub const DEFAULT_TABLE: &str = "state";

/// Configuration of a [`CompositeStore`](crate::CompositeStore).
///
/// Both settings are part of the persisted layout: a store must be reopened
/// with the same table and separator to find its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The logical backend table the store reads and writes.
    pub table: String,
    /// The key separator bytes.
    pub separator: Separator,
}

impl StoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the key separator.
    #[must_use]
    pub const fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { table: DEFAULT_TABLE.to_string(), separator: Separator::default() }
    }
}
