//! Widget instance settings: allocation, creation, merge-update, deletion.
//!
//! Every instance of one base type lives in a single [`InstanceCollection`]
//! stored under `widget_{base}`. Writers are serialized by one mutex so that
//! allocating a number and creating its record happen atomically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::constants::FORM_INDEX_PLACEHOLDER;
use crate::error::{WidgetError, WidgetResult};
use crate::models::{SettingsRecord, WidgetType};
use crate::placement::allocate_instance_number;

use super::form_schema::{FormSchemaInferrer, InferredSchema};
use super::registry::Registry;

/// Instance store adapter over the registry's option storage.
pub struct InstanceStore {
    registry: Registry,
    inferrer: FormSchemaInferrer,
    schemas: Mutex<HashMap<String, Arc<InferredSchema>>>,
    /// Highest instance number ever handed out or deleted, per base
    high_water: Mutex<HashMap<String, u32>>,
    write_lock: Mutex<()>,
}

impl InstanceStore {
    /// Creates an instance store.
    ///
    /// # Errors
    ///
    /// Returns an error if the form-schema patterns fail to compile.
    pub fn new(registry: Registry) -> anyhow::Result<Self> {
        Ok(Self {
            registry,
            inferrer: FormSchemaInferrer::new()?,
            schemas: Mutex::new(HashMap::new()),
            high_water: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        })
    }

    /// Inferred settings schema of a widget type, cached per base type.
    pub fn schema(&self, widget_type: &WidgetType) -> Arc<InferredSchema> {
        let mut schemas = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
        schemas
            .entry(widget_type.id_base.clone())
            .or_insert_with(|| {
                let form = self
                    .registry
                    .host()
                    .render_form(widget_type, FORM_INDEX_PLACEHOLDER);
                let schema = self.inferrer.infer(&form);
                debug!(
                    "Inferred {} field(s) for widget type '{}'",
                    schema.fields.len(),
                    widget_type.id_base
                );
                Arc::new(schema)
            })
            .clone()
    }

    /// Reads one instance record.
    pub fn get_instance(&self, id_base: &str, number: u32) -> WidgetResult<Option<SettingsRecord>> {
        Ok(self.registry.read_instances(id_base)?.get(number).cloned())
    }

    /// Next free instance number for a base type.
    ///
    /// Never returns a number that was handed out or deleted earlier in this
    /// process.
    pub fn next_instance(&self, id_base: &str) -> WidgetResult<u32> {
        let _guard = self.lock_writes();
        self.next_unlocked(id_base)
    }

    /// Creates the record for instance `number` of `id_base`.
    ///
    /// The first instance of a type handed out by this process is seeded with
    /// every inferred field set to `""`; later instances start empty, also
    /// after every earlier instance was deleted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` for an unknown base and `InvalidOperation`
    /// if the instance already exists.
    pub fn create_instance(&self, id_base: &str, number: u32) -> WidgetResult<SettingsRecord> {
        let _guard = self.lock_writes();
        self.create_unlocked(id_base, number)
    }

    /// Allocates the next number for `id_base` and creates its record.
    pub fn create_next(&self, id_base: &str) -> WidgetResult<(u32, SettingsRecord)> {
        let _guard = self.lock_writes();
        let number = self.next_unlocked(id_base)?;
        let record = self.create_unlocked(id_base, number)?;
        Ok((number, record))
    }

    /// Merges `updates` into an existing record and returns the result.
    ///
    /// Only known fields are written: keys already in the record plus the
    /// inferred schema of the type. Other keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the instance does not exist.
    pub fn update_instance(
        &self,
        id_base: &str,
        number: u32,
        updates: &SettingsRecord,
    ) -> WidgetResult<SettingsRecord> {
        let _guard = self.lock_writes();
        let widget_type = self.registry.widget_type(id_base)?;
        let schema = self.schema(&widget_type);

        let mut instances = self.registry.read_instances(id_base)?;
        let record = instances.get_mut(number).ok_or_else(|| {
            WidgetError::not_found(format!("Widget instance {id_base}-{number} does not exist"))
        })?;

        for (field, value) in updates {
            if record.contains_key(field) || schema.contains(field) {
                record.insert(field.clone(), value.clone());
            } else {
                debug!("Ignoring unknown field '{field}' for {id_base}-{number}");
            }
        }
        let updated = record.clone();

        self.registry.write_instances(id_base, &instances)?;
        Ok(updated)
    }

    /// Deletes an instance record. Deleting a missing instance succeeds.
    ///
    /// Returns whether a record was removed.
    pub fn delete_instance(&self, id_base: &str, number: u32) -> WidgetResult<bool> {
        let _guard = self.lock_writes();
        let mut instances = self.registry.read_instances(id_base)?;
        let removed = instances.remove(number).is_some();
        if removed {
            self.registry.write_instances(id_base, &instances)?;
        }
        self.raise_high_water(id_base, number);
        Ok(removed)
    }

    /// Writes `record` back as instance `number`, replacing whatever is stored.
    ///
    /// Used to undo an instance write when the request that made it fails.
    pub fn restore_instance(
        &self,
        id_base: &str,
        number: u32,
        record: SettingsRecord,
    ) -> WidgetResult<()> {
        let _guard = self.lock_writes();
        let mut instances = self.registry.read_instances(id_base)?;
        instances.insert(number, record);
        self.registry.write_instances(id_base, &instances)?;
        debug!("Restored widget instance {id_base}-{number}");
        Ok(())
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_unlocked(&self, id_base: &str) -> WidgetResult<u32> {
        let items = self.registry.lookup_items()?;
        let placements = self.registry.lookup_placement_map()?;

        let item_ids: Vec<String> = items.iter().map(|item| item.id.to_string()).collect();
        let placed_ids = placements
            .sidebar_ids()
            .flat_map(|sidebar_id| placements.sequence(sidebar_id));
        let allocated = allocate_instance_number(
            id_base,
            item_ids
                .iter()
                .map(String::as_str)
                .chain(placed_ids.map(String::as_str)),
        );

        Ok(allocated.max(self.high_water_mark(id_base).saturating_add(1)))
    }

    fn create_unlocked(&self, id_base: &str, number: u32) -> WidgetResult<SettingsRecord> {
        let widget_type = self.registry.widget_type(id_base)?;
        let mut instances = self.registry.read_instances(id_base)?;
        if instances.contains(number) {
            return Err(WidgetError::invalid_operation(format!(
                "Widget instance {id_base}-{number} already exists"
            )));
        }

        let first_ever = instances.is_empty() && self.high_water_mark(id_base) == 0;
        let record = if first_ever {
            self.schema(&widget_type).seed_record()
        } else {
            SettingsRecord::new()
        };
        instances.insert(number, record.clone());
        self.registry.write_instances(id_base, &instances)?;
        self.raise_high_water(id_base, number);

        debug!("Created widget instance {id_base}-{number}");
        Ok(record)
    }

    fn high_water_mark(&self, id_base: &str) -> u32 {
        self.high_water
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id_base)
            .copied()
            .unwrap_or(0)
    }

    fn raise_high_water(&self, id_base: &str, number: u32) {
        let mut high_water = self.high_water.lock().unwrap_or_else(PoisonError::into_inner);
        let mark = high_water.entry(id_base.to_string()).or_insert(0);
        *mark = (*mark).max(number);
    }
}
