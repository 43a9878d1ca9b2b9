//! JSON file backed option store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use super::OptionStore;

/// Option store persisted as a single JSON object on disk.
///
/// The whole file is loaded on open and rewritten on every write using a
/// temp file + rename, so the file is never left half-written.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    options: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a
    /// JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let options = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read option store: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse option store: {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        debug!("Opened option store {} ({} keys)", path.display(), options.len());

        Ok(Self {
            path,
            options: Mutex::new(options),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, options: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }
        }

        let content =
            serde_json::to_string_pretty(options).context("Failed to serialize option store")?;
        let temp_path = self.path.with_extension("json.tmp");

        // Write to temp file
        fs::write(&temp_path, content).with_context(|| {
            format!("Failed to write temp option store: {}", temp_path.display())
        })?;

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!("Failed to rename temp option store to: {}", self.path.display())
        })?;

        Ok(())
    }
}

impl OptionStore for JsonFileStore {
    fn read_option(&self, key: &str) -> Result<Option<Value>> {
        let options = self.options.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(options.get(key).cloned())
    }

    fn write_option(&self, key: &str, value: Value) -> Result<()> {
        let mut options = self.options.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = options.insert(key.to_string(), value);
        if let Err(err) = self.persist(&options) {
            // Keep memory and disk in agreement when the write fails
            match previous {
                Some(previous) => options.insert(key.to_string(), previous),
                None => options.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }
}
