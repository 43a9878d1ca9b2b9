//! Service layer for business logic.
//!
//! This module contains the services that sit between the endpoint layer and
//! storage: the registry, the instance store, the form-schema inferrer, the
//! sidebar lock table, and the [`WidgetService`] facade that coordinates them.

pub mod form_schema;
pub mod instances;
pub mod locks;
pub mod registry;
pub mod widgets;

// Re-export commonly used types
pub use form_schema::{FieldKind, FormSchemaInferrer, InferredField, InferredSchema};
pub use instances::InstanceStore;
pub use locks::SidebarLocks;
pub use registry::{Registry, WidgetItem};
pub use widgets::{
    DeletedWidget, SidebarView, WidgetService, WidgetTypeView, WidgetUpdate, WidgetView,
};
