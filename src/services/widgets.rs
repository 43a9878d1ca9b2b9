//! Sidebar and widget operations exposed by the REST endpoints.
//!
//! Placement mutations follow one protocol: resolve the widget's current
//! sidebar, lock every sidebar the mutation touches, re-read the map and check
//! the widget has not moved meanwhile, compute the next map on a copy, then
//! commit only the touched sidebars onto the latest stored map.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{WidgetError, WidgetResult};
use crate::host::WidgetHost;
use crate::models::{RenderArgs, SettingsRecord, Sidebar, WidgetId};
use crate::placement::PlacementMap;
use crate::store::OptionStore;

use super::form_schema::InferredField;
use super::instances::InstanceStore;
use super::locks::SidebarLocks;
use super::registry::{Registry, WidgetItem};

/// How often a mutation is retried when the widget moves under it.
const MAX_PLACEMENT_ATTEMPTS: usize = 5;

/// A sidebar with its ordered widget ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarView {
    /// Sidebar definition and decoration
    #[serde(flatten)]
    pub sidebar: Sidebar,
    /// Widget ids placed in the sidebar, in display order
    pub active_widgets: Vec<String>,
}

/// A widget as returned by the endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    /// Widget id (`{base}-{number}`)
    pub id: String,
    /// Widget base type
    pub id_base: String,
    /// Human-readable type name
    pub name: String,
    /// CSS class name
    pub classname: String,
    /// Type description
    pub description: String,
    /// Sidebar holding the widget, if placed
    pub in_sidebar: Option<String>,
    /// 1-based position in that sidebar, if placed
    pub position: Option<usize>,
    /// Decoration of the holding sidebar with `before_widget` filled in
    pub sidebar_params: Option<Sidebar>,
    /// Whether a settings record exists (false for a type's template item)
    pub has_output: bool,
    /// Instance number
    pub instance_number: u32,
    /// Settings record, if one exists
    pub instance: Option<SettingsRecord>,
    /// Host-rendered display markup
    pub widget_output: String,
}

/// A registered widget type with its inferred settings fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetTypeView {
    /// Base id
    pub id_base: String,
    /// Human-readable name
    pub name: String,
    /// CSS class name
    pub classname: String,
    /// Type description
    pub description: String,
    /// Fields inferred from the configuration form
    pub fields: Vec<InferredField>,
}

/// Result of deleting a widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedWidget {
    /// Always true
    pub deleted: bool,
    /// The widget as it was before deletion
    pub previous: WidgetView,
}

/// Changes requested for one widget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetUpdate {
    /// Settings to merge into the instance record
    pub settings: SettingsRecord,
    /// Destination sidebar for a move
    pub sidebar_id: Option<String>,
    /// Requested 1-based position
    pub sidebar_position: Option<i64>,
}

/// Sidebar and widget operations over a host and an option store.
pub struct WidgetService {
    registry: Registry,
    instances: InstanceStore,
    locks: SidebarLocks,
    commit_lock: Mutex<()>,
}

impl WidgetService {
    /// Creates the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance store cannot be initialized.
    pub fn new(host: Arc<dyn WidgetHost>, store: Arc<dyn OptionStore>) -> anyhow::Result<Self> {
        let registry = Registry::new(host, store);
        Ok(Self {
            instances: InstanceStore::new(registry.clone())?,
            registry,
            locks: SidebarLocks::new(),
            commit_lock: Mutex::new(()),
        })
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying instance store.
    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Every registered sidebar with its widgets.
    pub fn list_sidebars(&self) -> WidgetResult<Vec<SidebarView>> {
        let map = self.registry.lookup_placement_map()?;
        Ok(self
            .registry
            .lookup_containers()
            .into_iter()
            .map(|sidebar| sidebar_view(sidebar, &map))
            .collect())
    }

    /// One sidebar with its widgets.
    pub fn get_sidebar(&self, sidebar_id: &str) -> WidgetResult<SidebarView> {
        let sidebar = self.registry.sidebar(sidebar_id)?;
        let map = self.registry.lookup_placement_map()?;
        Ok(sidebar_view(sidebar, &map))
    }

    /// Every registered widget, including template items.
    pub fn list_widgets(&self) -> WidgetResult<Vec<WidgetView>> {
        let map = self.registry.lookup_placement_map()?;
        let items = self.registry.lookup_items()?;
        items.iter().map(|item| self.widget_view(item, &map)).collect()
    }

    /// One widget.
    pub fn get_widget(&self, widget_id: &str) -> WidgetResult<WidgetView> {
        let item = self.registry.lookup_item(widget_id)?;
        let map = self.registry.lookup_placement_map()?;
        self.widget_view(&item, &map)
    }

    /// Every registered widget type with its inferred fields.
    pub fn list_widget_types(&self) -> Vec<WidgetTypeView> {
        self.registry
            .widget_types()
            .into_iter()
            .map(|widget_type| {
                let schema = self.instances.schema(&widget_type);
                WidgetTypeView {
                    classname: widget_type.classname(),
                    id_base: widget_type.id_base,
                    name: widget_type.name,
                    description: widget_type.description,
                    fields: schema.fields.clone(),
                }
            })
            .collect()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Creates an instance of `widget_base` and places it in `sidebar_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` for an unknown base or sidebar.
    pub fn create_widget(
        &self,
        widget_base: &str,
        sidebar_id: &str,
        position: i64,
    ) -> WidgetResult<WidgetView> {
        self.registry.widget_type(widget_base)?;
        self.registry.sidebar(sidebar_id)?;

        let (number, _) = self.instances.create_next(widget_base)?;
        let widget_id = WidgetId::new(widget_base, number).to_string();

        let placed = self.mutate_placement(&widget_id, Some(sidebar_id), |map| {
            map.insert(sidebar_id, &widget_id, position).map(drop)
        });
        if let Err(err) = placed {
            warn!("Placing {widget_id} failed, removing its instance: {err}");
            self.instances.delete_instance(widget_base, number)?;
            return Err(err);
        }

        info!("Created widget {widget_id} in {sidebar_id}");
        self.get_widget(&widget_id)
    }

    /// Merges settings into a widget and optionally moves or repositions it.
    ///
    /// With `sidebar_id` the widget moves there (position defaults to 1);
    /// with only `sidebar_position` it moves within its current sidebar.
    /// The placement change is checked on a copy of the map before any
    /// settings are written, and the previous record is written back if the
    /// placement commit fails.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` for an unknown widget or sidebar, or when
    /// repositioning a widget that is in no sidebar, and `NotFound` for a
    /// widget without a stored instance.
    pub fn update_widget(&self, widget_id: &str, update: &WidgetUpdate) -> WidgetResult<WidgetView> {
        let item = self.registry.lookup_item(widget_id)?;
        let id_base = item.id.id_base();
        let number = item.id.number();
        let previous = match self.instances.get_instance(id_base, number)? {
            Some(record) if item.has_instance => record,
            _ => {
                return Err(WidgetError::not_found(format!(
                    "Widget {widget_id} has no stored instance"
                )))
            }
        };

        if let Some(dest) = &update.sidebar_id {
            self.registry.sidebar(dest)?;
        }
        let moves = update.sidebar_id.is_some() || update.sidebar_position.is_some();
        if moves {
            let mut preview = self.registry.lookup_placement_map()?;
            if update.sidebar_id.is_none() && preview.locate(widget_id)?.is_none() {
                return Err(WidgetError::invalid_reference(format!(
                    "Widget {widget_id} is not in a sidebar"
                )));
            }
            apply_placement_update(&mut preview, widget_id, update)?;
            preview.validate()?;
        }

        self.instances
            .update_instance(id_base, number, &update.settings)?;

        if moves {
            let placed = self.mutate_placement(widget_id, update.sidebar_id.as_deref(), |map| {
                apply_placement_update(map, widget_id, update)
            });
            if let Err(err) = placed {
                warn!("Placing {widget_id} failed, restoring its settings: {err}");
                self.instances.restore_instance(id_base, number, previous)?;
                return Err(err);
            }
        }

        match (&update.sidebar_id, update.sidebar_position) {
            (Some(dest), position) => info!(
                "Moved widget {widget_id} to {dest} at position {}",
                position.unwrap_or(1)
            ),
            (None, Some(position)) => {
                info!("Repositioned widget {widget_id} to position {position}");
            }
            (None, None) => info!("Updated widget {widget_id}"),
        }

        self.get_widget(widget_id)
    }

    /// Deletes a widget's instance and removes it from its sidebar.
    ///
    /// The instance record is written back if the placement cannot be
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` for an unknown widget and `NotFound` for a
    /// widget without a stored instance.
    pub fn delete_widget(&self, widget_id: &str) -> WidgetResult<DeletedWidget> {
        let item = self.registry.lookup_item(widget_id)?;
        let id_base = item.id.id_base();
        let number = item.id.number();
        let record = match self.instances.get_instance(id_base, number)? {
            Some(record) if item.has_instance => record,
            _ => {
                return Err(WidgetError::not_found(format!(
                    "Widget {widget_id} has no stored instance"
                )))
            }
        };
        // Fails on a duplicate placement before anything is deleted.
        let previous = self.widget_view(&item, &self.registry.lookup_placement_map()?)?;

        self.instances.delete_instance(id_base, number)?;
        let unplaced = self.mutate_placement(widget_id, None, |map| map.remove(widget_id).map(drop));
        if let Err(err) = unplaced {
            warn!("Unplacing {widget_id} failed, restoring its instance: {err}");
            self.instances.restore_instance(id_base, number, record)?;
            return Err(err);
        }

        info!("Deleted widget {widget_id}");
        Ok(DeletedWidget {
            deleted: true,
            previous,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Runs `mutate` on a copy of the placement map while holding the locks
    /// of the widget's current sidebar and `dest`, then commits.
    fn mutate_placement<F>(&self, widget_id: &str, dest: Option<&str>, mutate: F) -> WidgetResult<()>
    where
        F: Fn(&mut PlacementMap) -> WidgetResult<()>,
    {
        for attempt in 1..=MAX_PLACEMENT_ATTEMPTS {
            let source = self.current_sidebar(widget_id)?;
            let lock_ids: Vec<String> = source
                .iter()
                .cloned()
                .chain(dest.map(str::to_string))
                .collect();
            let guard = self.locks.lock_many(lock_ids);

            let mut next = self.registry.lookup_placement_map()?;
            let current = next.locate(widget_id)?.map(|placement| placement.sidebar_id);
            if current != source {
                debug!("{widget_id} moved while waiting for locks (attempt {attempt}), retrying");
                continue;
            }

            mutate(&mut next)?;
            if guard.sidebar_ids().is_empty() {
                return Ok(());
            }
            return self.commit(&next, guard.sidebar_ids());
        }

        Err(WidgetError::inconsistency(format!(
            "placement of {widget_id} kept changing after {MAX_PLACEMENT_ATTEMPTS} attempts"
        )))
    }

    /// Writes the touched sidebars of `next` onto the latest stored map.
    fn commit(&self, next: &PlacementMap, touched: &[String]) -> WidgetResult<()> {
        let _commit = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut latest = self.registry.lookup_placement_map()?;
        latest.apply_sequences(next, touched);
        latest.validate()?;
        self.registry.store_placement_map(&latest)
    }

    fn current_sidebar(&self, widget_id: &str) -> WidgetResult<Option<String>> {
        Ok(self
            .registry
            .lookup_placement_map()?
            .locate(widget_id)?
            .map(|placement| placement.sidebar_id))
    }

    fn widget_view(&self, item: &WidgetItem, map: &PlacementMap) -> WidgetResult<WidgetView> {
        let id = item.id.to_string();
        let id_base = item.id.id_base();
        let number = item.id.number();
        let classname = item.widget_type.classname();

        let placement = map.locate(&id)?;
        let sidebar = placement
            .as_ref()
            .and_then(|placement| self.registry.sidebar(&placement.sidebar_id).ok());
        let args = sidebar
            .as_ref()
            .map_or_else(RenderArgs::default, |sidebar| sidebar.render_args(&id, &classname));

        let instance = if item.has_instance {
            self.instances.get_instance(id_base, number)?
        } else {
            None
        };
        let widget_output = instance.as_ref().map_or_else(String::new, |settings| {
            self.registry
                .host()
                .render_widget(&item.widget_type, number, settings, &args)
        });

        Ok(WidgetView {
            sidebar_params: sidebar.map(|sidebar| sidebar.params_for_widget(&id, &classname)),
            in_sidebar: placement.as_ref().map(|p| p.sidebar_id.clone()),
            position: placement.map(|p| p.position),
            id_base: id_base.to_string(),
            name: item.widget_type.name.clone(),
            description: item.widget_type.description.clone(),
            has_output: item.has_instance,
            instance_number: number,
            instance,
            widget_output,
            classname,
            id,
        })
    }
}

/// Applies the move or reposition requested by `update` to `map`.
fn apply_placement_update(
    map: &mut PlacementMap,
    widget_id: &str,
    update: &WidgetUpdate,
) -> WidgetResult<()> {
    match (&update.sidebar_id, update.sidebar_position) {
        (Some(dest), position) => map
            .move_widget(widget_id, dest, position.unwrap_or(1))
            .map(drop),
        (None, Some(position)) => map.reposition(widget_id, position).map(drop),
        (None, None) => Ok(()),
    }
}

fn sidebar_view(sidebar: Sidebar, map: &PlacementMap) -> SidebarView {
    SidebarView {
        active_widgets: map.sequence(&sidebar.id).to_vec(),
        sidebar,
    }
}
