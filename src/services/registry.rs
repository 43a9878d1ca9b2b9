//! Explicit registry over the host and the option store.
//!
//! Sidebars and widget types come from the [`WidgetHost`]; the placement map
//! and instance collections come from the [`OptionStore`]. The registry joins
//! them into the widget items the endpoints list.

use std::sync::Arc;

use crate::constants::{widget_option_key, PLACEMENT_OPTION_KEY, TEMPLATE_INSTANCE_NUMBER};
use crate::error::{WidgetError, WidgetResult};
use crate::host::WidgetHost;
use crate::models::{InstanceCollection, Sidebar, WidgetId, WidgetType};
use crate::placement::PlacementMap;
use crate::store::OptionStore;

/// One registered widget: a stored instance or the template of a type with
/// no instances yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetItem {
    /// Widget id (`{base}-{number}`)
    pub id: WidgetId,
    /// The widget's type
    pub widget_type: WidgetType,
    /// Whether a settings record is stored for this id
    pub has_instance: bool,
}

/// Lookup service for sidebars, widget items, and the placement map.
#[derive(Clone)]
pub struct Registry {
    host: Arc<dyn WidgetHost>,
    store: Arc<dyn OptionStore>,
}

impl Registry {
    /// Creates a registry over a host and an option store.
    pub fn new(host: Arc<dyn WidgetHost>, store: Arc<dyn OptionStore>) -> Self {
        Self { host, store }
    }

    /// The host platform.
    pub fn host(&self) -> &dyn WidgetHost {
        self.host.as_ref()
    }

    /// Every registered sidebar.
    pub fn lookup_containers(&self) -> Vec<Sidebar> {
        self.host.sidebars()
    }

    /// Looks up one sidebar.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if no sidebar has this id.
    pub fn sidebar(&self, sidebar_id: &str) -> WidgetResult<Sidebar> {
        self.lookup_containers()
            .into_iter()
            .find(|sidebar| sidebar.id == sidebar_id)
            .ok_or_else(|| WidgetError::invalid_reference(format!("Invalid sidebar ID: {sidebar_id}")))
    }

    /// Every registered widget type.
    pub fn widget_types(&self) -> Vec<WidgetType> {
        self.host.widget_types()
    }

    /// Looks up a widget type by base id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the base is not registered.
    pub fn widget_type(&self, id_base: &str) -> WidgetResult<WidgetType> {
        self.widget_types()
            .into_iter()
            .find(|widget_type| widget_type.id_base == id_base)
            .ok_or_else(|| WidgetError::invalid_reference(format!("Invalid widget base: {id_base}")))
    }

    /// Reads the current placement map.
    pub fn lookup_placement_map(&self) -> WidgetResult<PlacementMap> {
        let stored = self.store.read_option(PLACEMENT_OPTION_KEY)?;
        Ok(PlacementMap::from_value(stored.as_ref()))
    }

    /// Persists a placement map, keeping non-placement entries of the stored value.
    pub fn store_placement_map(&self, map: &PlacementMap) -> WidgetResult<()> {
        let stored = self.store.read_option(PLACEMENT_OPTION_KEY)?;
        self.store
            .write_option(PLACEMENT_OPTION_KEY, map.merge_into(stored.as_ref()))?;
        Ok(())
    }

    /// Reads every stored instance of a widget base type.
    pub fn read_instances(&self, id_base: &str) -> WidgetResult<InstanceCollection> {
        let stored = self.store.read_option(&widget_option_key(id_base))?;
        Ok(InstanceCollection::from_value(stored.as_ref()))
    }

    /// Persists every instance of a widget base type.
    pub fn write_instances(&self, id_base: &str, instances: &InstanceCollection) -> WidgetResult<()> {
        self.store
            .write_option(&widget_option_key(id_base), instances.to_value())?;
        Ok(())
    }

    /// Every registered widget, in widget-type order then instance order.
    ///
    /// A type without stored instances contributes its template item
    /// `{base}-1`.
    pub fn lookup_items(&self) -> WidgetResult<Vec<WidgetItem>> {
        let mut items = Vec::new();
        for widget_type in self.widget_types() {
            let instances = self.read_instances(&widget_type.id_base)?;
            if instances.is_empty() {
                items.push(WidgetItem {
                    id: WidgetId::new(widget_type.id_base.clone(), TEMPLATE_INSTANCE_NUMBER),
                    widget_type,
                    has_instance: false,
                });
                continue;
            }
            for number in instances.numbers() {
                items.push(WidgetItem {
                    id: WidgetId::new(widget_type.id_base.clone(), number),
                    widget_type: widget_type.clone(),
                    has_instance: true,
                });
            }
        }
        Ok(items)
    }

    /// Looks up one registered widget.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the id is malformed or not registered.
    pub fn lookup_item(&self, widget_id: &str) -> WidgetResult<WidgetItem> {
        let id: WidgetId = widget_id.parse()?;
        let widget_type = self
            .widget_type(id.id_base())
            .map_err(|_| WidgetError::invalid_reference(format!("Invalid widget ID: {widget_id}")))?;
        let instances = self.read_instances(id.id_base())?;

        let has_instance = instances.contains(id.number());
        let is_template = instances.is_empty() && id.number() == TEMPLATE_INSTANCE_NUMBER;
        if !has_instance && !is_template {
            return Err(WidgetError::invalid_reference(format!(
                "Invalid widget ID: {widget_id}"
            )));
        }

        Ok(WidgetItem {
            id,
            widget_type,
            has_instance,
        })
    }
}
