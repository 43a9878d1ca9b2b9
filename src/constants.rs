//! Application-wide constants.
//!
//! This module defines constants used throughout the application, including
//! the application name and the option keys shared with the host store.

/// The display name of the application (human-readable, with proper capitalization).
pub const APP_NAME: &str = "Widget REST";

/// The directory name used under the platform config dir.
pub const APP_DIR_NAME: &str = "WidgetRest";

/// Option key holding the placement map (sidebar id -> ordered widget ids).
pub const PLACEMENT_OPTION_KEY: &str = "sidebars_widgets";

/// Prefix of the option key that holds every instance of one widget base type.
pub const WIDGET_OPTION_PREFIX: &str = "widget_";

/// Reserved metadata key inside a widget instance collection.
pub const MULTIWIDGET_KEY: &str = "_multiwidget";

/// Index marker the host substitutes into form markup rendered for a new instance.
pub const FORM_INDEX_PLACEHOLDER: &str = "__i__";

/// Instance number of the implicit template widget of a never-configured type.
pub const TEMPLATE_INSTANCE_NUMBER: u32 = 1;

/// Returns the option key for a widget base type (e.g. `widget_text`).
#[must_use]
pub fn widget_option_key(id_base: &str) -> String {
    format!("{WIDGET_OPTION_PREFIX}{id_base}")
}

/// Operation names accepted as keys of the `[permissions]` config table.
pub const PERMISSION_OPERATIONS: &[&str] = &[
    "get_sidebars",
    "get_sidebar",
    "get_widgets",
    "get_widget",
    "create_widget",
    "update_widget",
    "delete_widget",
];
