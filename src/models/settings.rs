//! Per-instance widget settings.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::constants::MULTIWIDGET_KEY;

/// Field name to value mapping for one widget instance.
pub type SettingsRecord = Map<String, Value>;

/// Every stored instance of one widget base type, keyed by instance number.
///
/// The stored form is a JSON object whose keys are instance numbers plus the
/// reserved `_multiwidget` marker. The marker is dropped when reading and
/// written back when serializing, so it never shows up as an instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceCollection {
    instances: BTreeMap<u32, SettingsRecord>,
}

impl InstanceCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a collection from its stored JSON form.
    ///
    /// Entries whose key is not a positive integer or whose value is not an
    /// object are skipped.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut instances = BTreeMap::new();
        if let Some(Value::Object(entries)) = value {
            for (key, record) in entries {
                if key == MULTIWIDGET_KEY {
                    continue;
                }
                let Ok(number) = key.parse::<u32>() else {
                    continue;
                };
                if number == 0 {
                    continue;
                }
                if let Value::Object(record) = record {
                    instances.insert(number, record.clone());
                }
            }
        }
        Self { instances }
    }

    /// Serializes the collection, adding the `_multiwidget` marker.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut entries = Map::new();
        for (number, record) in &self.instances {
            entries.insert(number.to_string(), Value::Object(record.clone()));
        }
        entries.insert(MULTIWIDGET_KEY.to_string(), Value::from(1));
        Value::Object(entries)
    }

    /// Returns the record for an instance number.
    #[must_use]
    pub fn get(&self, number: u32) -> Option<&SettingsRecord> {
        self.instances.get(&number)
    }

    /// Returns a mutable record for an instance number.
    pub fn get_mut(&mut self, number: u32) -> Option<&mut SettingsRecord> {
        self.instances.get_mut(&number)
    }

    /// Inserts or replaces the record for an instance number.
    pub fn insert(&mut self, number: u32, record: SettingsRecord) {
        self.instances.insert(number, record);
    }

    /// Removes an instance, returning its record if it existed.
    pub fn remove(&mut self, number: u32) -> Option<SettingsRecord> {
        self.instances.remove(&number)
    }

    /// Whether an instance with this number exists.
    #[must_use]
    pub fn contains(&self, number: u32) -> bool {
        self.instances.contains_key(&number)
    }

    /// Instance numbers in ascending order.
    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.instances.keys().copied()
    }

    /// Whether the collection has no real instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Number of real instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }
}
