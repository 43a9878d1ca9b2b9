//! JSON Schema documents served at `/api/sidebars/schema` and `/api/widgets/schema`.

use serde_json::{json, Value};

const DRAFT: &str = "http://json-schema.org/draft-04/schema#";

fn string_property(description: &str) -> Value {
    json!({ "description": description, "type": "string" })
}

/// Schema of a sidebar response.
#[must_use]
pub fn sidebar_schema() -> Value {
    json!({
        "$schema": DRAFT,
        "title": "sidebar",
        "type": "object",
        "properties": {
            "id": string_property("Sidebar ID."),
            "name": string_property("Name of the sidebar."),
            "description": string_property("Description of the sidebar's purpose."),
            "class": string_property("CSS class for the sidebar."),
            "before_widget": string_property("HTML output before each widget."),
            "after_widget": string_property("HTML output after each widget."),
            "before_title": string_property("HTML output before a widget title."),
            "after_title": string_property("HTML output after a widget title."),
            "active_widgets": {
                "description": "Widget IDs in the sidebar, in display order.",
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

/// Schema of a widget response.
#[must_use]
pub fn widget_schema() -> Value {
    json!({
        "$schema": DRAFT,
        "title": "widget",
        "type": "object",
        "properties": {
            "id": string_property("Unique ID of the widget."),
            "id_base": string_property("Base ID shared by every instance of the widget type."),
            "name": string_property("Name of the widget type."),
            "classname": string_property("CSS class name for the widget."),
            "description": string_property("Description of the widget's purpose."),
            "in_sidebar": {
                "description": "Sidebar the widget is in, or null when it is not placed.",
                "type": ["string", "null"]
            },
            "position": {
                "description": "1-based position in the sidebar, or null when it is not placed.",
                "type": ["integer", "null"],
                "minimum": 1
            },
            "sidebar_params": {
                "description": "Sidebar parameters used for rendering the widget.",
                "type": ["object", "null"]
            },
            "has_output": {
                "description": "Whether the widget has a stored instance and renders output.",
                "type": "boolean"
            },
            "instance_number": {
                "description": "Instance number of the widget.",
                "type": "integer",
                "minimum": 1
            },
            "instance": {
                "description": "Settings of the widget instance.",
                "type": ["object", "null"]
            },
            "widget_output": string_property("The rendered output of the widget in its sidebar.")
        }
    })
}
