//! Sidebar (widget container) definitions.

use serde::{Deserialize, Serialize};

/// A named, ordered slot holding widget placements.
///
/// Sidebars are defined by the host. The decoration fields are opaque to the
/// placement engine and passed through unchanged, except that `before_widget`
/// has its `%1$s`/`%2$s` slots filled when a widget is rendered inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidebar {
    /// Unique sidebar identifier (e.g. "sidebar-1")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description of the sidebar's purpose
    #[serde(default)]
    pub description: String,
    /// CSS class for the sidebar
    #[serde(default)]
    pub class: String,
    /// Markup emitted before each widget (`%1$s` = widget id, `%2$s` = classname)
    #[serde(default = "default_before_widget")]
    pub before_widget: String,
    /// Markup emitted after each widget
    #[serde(default = "default_after_widget")]
    pub after_widget: String,
    /// Markup emitted before a widget title
    #[serde(default = "default_before_title")]
    pub before_title: String,
    /// Markup emitted after a widget title
    #[serde(default = "default_after_title")]
    pub after_title: String,
}

fn default_before_widget() -> String {
    r#"<li id="%1$s" class="widget %2$s">"#.to_string()
}

fn default_after_widget() -> String {
    "</li>\n".to_string()
}

fn default_before_title() -> String {
    r#"<h2 class="widgettitle">"#.to_string()
}

fn default_after_title() -> String {
    "</h2>\n".to_string()
}

impl Sidebar {
    /// Creates a sidebar with default decoration markup.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            class: String::new(),
            before_widget: default_before_widget(),
            after_widget: default_after_widget(),
            before_title: default_before_title(),
            after_title: default_after_title(),
        }
    }

    /// Returns a copy of this sidebar with `before_widget` filled in for one widget.
    #[must_use]
    pub fn params_for_widget(&self, widget_id: &str, classname: &str) -> Self {
        let mut params = self.clone();
        params.before_widget = fill_widget_slots(&self.before_widget, widget_id, classname);
        params
    }

    /// Render arguments for a widget placed in this sidebar.
    #[must_use]
    pub fn render_args(&self, widget_id: &str, classname: &str) -> RenderArgs {
        if self.before_widget.is_empty() {
            return RenderArgs::default();
        }
        RenderArgs {
            before_widget: fill_widget_slots(&self.before_widget, widget_id, classname),
            after_widget: self.after_widget.clone(),
            before_title: self.before_title.clone(),
            after_title: self.after_title.clone(),
        }
    }
}

/// Substitutes the positional `%1$s` (id) and `%2$s` (classname) slots.
fn fill_widget_slots(template: &str, widget_id: &str, classname: &str) -> String {
    template
        .replace("%1$s", widget_id)
        .replace("%2$s", classname)
}

/// Display arguments handed to the host render callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderArgs {
    /// Markup before the widget
    pub before_widget: String,
    /// Markup after the widget
    pub after_widget: String,
    /// Markup before the widget title
    pub before_title: String,
    /// Markup after the widget title
    pub after_title: String,
}

impl Default for RenderArgs {
    /// Arguments used when the widget is not in a sidebar.
    fn default() -> Self {
        Self {
            before_widget: r#"<section class="widget">"#.to_string(),
            after_widget: "</section>".to_string(),
            before_title: r#"<h2 class="widget-title">"#.to_string(),
            after_title: "</h2>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_for_widget_fills_slots() {
        let sidebar = Sidebar::new("sidebar-1", "Main");
        let params = sidebar.params_for_widget("text-2", "widget_text");
        assert_eq!(
            params.before_widget,
            r#"<li id="text-2" class="widget widget_text">"#
        );
        assert_eq!(params.after_widget, sidebar.after_widget);
        // Original sidebar is untouched
        assert!(sidebar.before_widget.contains("%1$s"));
    }

    #[test]
    fn test_render_args_empty_before_widget_uses_defaults() {
        let mut sidebar = Sidebar::new("footer-1", "Footer");
        sidebar.before_widget = String::new();
        assert_eq!(sidebar.render_args("text-2", "widget_text"), RenderArgs::default());
    }

    #[test]
    fn test_sidebar_deserialize_defaults() {
        let sidebar: Sidebar = toml::from_str("id = \"sidebar-1\"\nname = \"Main\"\n").unwrap();
        assert_eq!(sidebar, Sidebar::new("sidebar-1", "Main"));
    }
}
