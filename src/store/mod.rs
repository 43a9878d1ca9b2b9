//! Key-value option storage.
//!
//! Sidebar placements and widget instance settings are persisted as JSON
//! values under string keys, mirroring the option table of the host platform.
//! The storage engine is pluggable through [`OptionStore`].

pub mod file;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use serde_json::Value;

pub use file::JsonFileStore;

/// Generic settings-blob persistence.
pub trait OptionStore: Send + Sync {
    /// Reads the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read_option(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn write_option(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory option store, used for tests and ephemeral servers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    options: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with options.
    #[must_use]
    pub fn with_options(options: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            options: RwLock::new(options.into_iter().collect()),
        }
    }
}

impl OptionStore for MemoryStore {
    fn read_option(&self, key: &str) -> Result<Option<Value>> {
        let options = self.options.read().unwrap_or_else(PoisonError::into_inner);
        Ok(options.get(key).cloned())
    }

    fn write_option(&self, key: &str, value: Value) -> Result<()> {
        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        options.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.read_option("widget_text").unwrap(), None);

        store.write_option("widget_text", json!({"2": {}})).unwrap();
        assert_eq!(
            store.read_option("widget_text").unwrap(),
            Some(json!({"2": {}}))
        );

        store.write_option("widget_text", json!({})).unwrap();
        assert_eq!(store.read_option("widget_text").unwrap(), Some(json!({})));
    }

    #[test]
    fn test_memory_store_with_options() {
        let store = MemoryStore::with_options([("a".to_string(), json!(1))]);
        assert_eq!(store.read_option("a").unwrap(), Some(json!(1)));
    }
}
