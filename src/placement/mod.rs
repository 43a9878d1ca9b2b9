//! Widget placement engine.
//!
//! Maintains the ordered list of widget ids per sidebar under insert, move and
//! remove. Every mutation is expressed through one index-based splice:
//! removing a widget shifts later widgets one slot earlier, inserting at a slot
//! shifts the widget there and everything after it one slot later.
//!
//! Positions in the public API are 1-based and clamped to `[1, len + 1]`.
//! A widget that is already placed is removed *before* its destination slot is
//! resolved, so a same-sidebar reposition is interpreted against the
//! post-removal sequence.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{WidgetError, WidgetResult};
use crate::models::WidgetId;

/// Where a widget sits: sidebar id plus 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Sidebar holding the widget
    pub sidebar_id: String,
    /// 1-based position within the sidebar
    pub position: usize,
}

/// Sidebar id to ordered widget ids.
///
/// Invariant: a widget id appears at most once in the whole map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlacementMap {
    sidebars: BTreeMap<String, Vec<String>>,
}

impl PlacementMap {
    /// Creates an empty placement map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a placement map from its stored JSON form.
    ///
    /// Only array entries are placement data; other entries (such as the
    /// host's `array_version` marker) and non-string elements are skipped.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut sidebars = BTreeMap::new();
        if let Some(Value::Object(entries)) = value {
            for (sidebar_id, entry) in entries {
                if let Value::Array(ids) = entry {
                    let sequence = ids
                        .iter()
                        .filter_map(|id| id.as_str().map(str::to_string))
                        .collect();
                    sidebars.insert(sidebar_id.clone(), sequence);
                }
            }
        }
        Self { sidebars }
    }

    /// Serializes the map on top of a previously stored value.
    ///
    /// Non-array entries of `stored` are preserved; every sidebar in this map
    /// replaces its stored sequence.
    #[must_use]
    pub fn merge_into(&self, stored: Option<&Value>) -> Value {
        let mut entries = match stored {
            Some(Value::Object(entries)) => entries.clone(),
            _ => Map::new(),
        };
        for (sidebar_id, sequence) in &self.sidebars {
            let ids = sequence.iter().cloned().map(Value::String).collect();
            entries.insert(sidebar_id.clone(), Value::Array(ids));
        }
        Value::Object(entries)
    }

    /// Ordered widget ids of a sidebar (empty if it has no sequence yet).
    #[must_use]
    pub fn sequence(&self, sidebar_id: &str) -> &[String] {
        self.sidebars.get(sidebar_id).map_or(&[], Vec::as_slice)
    }

    /// Replaces the whole sequence of one sidebar.
    pub fn set_sequence(&mut self, sidebar_id: impl Into<String>, sequence: Vec<String>) {
        self.sidebars.insert(sidebar_id.into(), sequence);
    }

    /// Copies the sequences of `sidebar_ids` from `other` into this map.
    pub fn apply_sequences(&mut self, other: &Self, sidebar_ids: &[String]) {
        for sidebar_id in sidebar_ids {
            self.set_sequence(sidebar_id.clone(), other.sequence(sidebar_id).to_vec());
        }
    }

    /// Sidebar ids that have a sequence, in lexical order.
    pub fn sidebar_ids(&self) -> impl Iterator<Item = &str> {
        self.sidebars.keys().map(String::as_str)
    }

    /// Finds the sidebar and position of a widget.
    ///
    /// # Errors
    ///
    /// Returns `InternalInconsistency` if the widget is placed more than once.
    pub fn locate(&self, widget_id: &str) -> WidgetResult<Option<Placement>> {
        let mut found: Option<Placement> = None;
        for (sidebar_id, sequence) in &self.sidebars {
            for (index, id) in sequence.iter().enumerate() {
                if id != widget_id {
                    continue;
                }
                if let Some(previous) = &found {
                    return Err(if previous.sidebar_id == *sidebar_id {
                        WidgetError::inconsistency(format!(
                            "{widget_id} appears twice in {sidebar_id}"
                        ))
                    } else {
                        WidgetError::inconsistency(format!(
                            "{widget_id} is placed in both {} and {sidebar_id}",
                            previous.sidebar_id
                        ))
                    });
                }
                found = Some(Placement {
                    sidebar_id: sidebar_id.clone(),
                    position: index + 1,
                });
            }
        }
        Ok(found)
    }

    /// Checks the no-duplicate-placement invariant over the whole map.
    ///
    /// # Errors
    ///
    /// Returns `InternalInconsistency` naming the first duplicated widget.
    pub fn validate(&self) -> WidgetResult<()> {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (sidebar_id, sequence) in &self.sidebars {
            for id in sequence {
                if let Some(first) = seen.insert(id.as_str(), sidebar_id.as_str()) {
                    return Err(WidgetError::inconsistency(format!(
                        "{id} is placed in both {first} and {sidebar_id}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Inserts a widget at a 1-based position, removing it from wherever it was.
    ///
    /// The position is clamped to `[1, len + 1]` of the destination sequence
    /// *after* the widget has been removed.
    ///
    /// # Errors
    ///
    /// Returns `InternalInconsistency` if the widget was placed more than once.
    pub fn insert(
        &mut self,
        sidebar_id: &str,
        widget_id: &str,
        requested_position: i64,
    ) -> WidgetResult<Placement> {
        self.remove(widget_id)?;

        let sequence = self.sidebars.entry(sidebar_id.to_string()).or_default();
        let index = clamp_position(requested_position, sequence.len());
        sequence.insert(index, widget_id.to_string());

        Ok(Placement {
            sidebar_id: sidebar_id.to_string(),
            position: index + 1,
        })
    }

    /// Removes a widget from its sidebar. Removing an unplaced widget is a no-op.
    ///
    /// Returns where the widget was, if anywhere.
    ///
    /// # Errors
    ///
    /// Returns `InternalInconsistency` if the widget was placed more than once.
    pub fn remove(&mut self, widget_id: &str) -> WidgetResult<Option<Placement>> {
        let Some(placement) = self.locate(widget_id)? else {
            return Ok(None);
        };
        if let Some(sequence) = self.sidebars.get_mut(&placement.sidebar_id) {
            sequence.remove(placement.position - 1);
        }
        Ok(Some(placement))
    }

    /// Moves a widget to a position in a (possibly different) sidebar.
    ///
    /// Equivalent to [`remove`](Self::remove) followed by
    /// [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Returns `InternalInconsistency` if the widget was placed more than once.
    pub fn move_widget(
        &mut self,
        widget_id: &str,
        dest_sidebar_id: &str,
        requested_position: i64,
    ) -> WidgetResult<Placement> {
        self.insert(dest_sidebar_id, widget_id, requested_position)
    }

    /// Moves a widget to another position inside its current sidebar.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the widget is not in any sidebar.
    pub fn reposition(&mut self, widget_id: &str, requested_position: i64) -> WidgetResult<Placement> {
        let current = self.locate(widget_id)?.ok_or_else(|| {
            WidgetError::invalid_reference(format!("Widget {widget_id} is not in a sidebar"))
        })?;
        self.insert(&current.sidebar_id, widget_id, requested_position)
    }
}

/// Clamps a 1-based position into a 0-based insertion index in `[0, len]`.
///
/// Below 1 means "first"; beyond the end means "append".
#[must_use]
pub fn clamp_position(requested: i64, len: usize) -> usize {
    if requested < 1 {
        return 0;
    }
    usize::try_from(requested - 1).map_or(len, |index| index.min(len))
}

/// Returns the next free instance number for a widget base type.
///
/// Scans `widget_ids` for ids of the form `{id_base}-{n}` and returns the
/// largest `n` plus one. With no matching id the answer is 2, because 1 is the
/// implicit template instance of a never-configured type.
///
/// # Examples
///
/// ```
/// use widget_rest::placement::allocate_instance_number;
///
/// assert_eq!(allocate_instance_number("text", ["text-1", "text-3"]), 4);
/// assert_eq!(allocate_instance_number("text", Vec::<&str>::new()), 2);
/// ```
pub fn allocate_instance_number<'a, I>(id_base: &str, widget_ids: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    widget_ids
        .into_iter()
        .filter_map(WidgetId::parse)
        .filter(|id| id.id_base() == id_base)
        .map(|id| id.number())
        .max()
        .map_or(2, |max| max.saturating_add(1))
}
