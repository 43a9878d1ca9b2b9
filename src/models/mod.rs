//! Data models for sidebars, widgets, and widget settings.
//!
//! This module contains the core data structures shared by the placement
//! engine, the services, and the web layer. Models are independent of the
//! host and of the storage backend.

pub mod settings;
pub mod sidebar;
pub mod widget;

// Re-export all model types
pub use settings::{InstanceCollection, SettingsRecord};
pub use sidebar::{RenderArgs, Sidebar};
pub use widget::{WidgetId, WidgetType};
