//! Host platform collaborator.
//!
//! The host owns sidebar definitions, the registered widget types, and the
//! callbacks that render a widget's configuration form and display output.
//! [`StaticHost`] implements it from a [`SiteDefinition`].

pub mod site;

use crate::constants::FORM_INDEX_PLACEHOLDER;
use crate::models::{RenderArgs, SettingsRecord, Sidebar, WidgetType};

pub use site::SiteDefinition;

/// Operations the services consume from the host platform.
pub trait WidgetHost: Send + Sync {
    /// Registered sidebars, in registration order.
    fn sidebars(&self) -> Vec<Sidebar>;

    /// Registered widget types, in registration order.
    fn widget_types(&self) -> Vec<WidgetType>;

    /// Renders the configuration form of a widget type for an instance index.
    ///
    /// The sentinel index `__i__` yields the stateless form used to infer a
    /// settings schema.
    fn render_form(&self, widget_type: &WidgetType, index: &str) -> String;

    /// Renders instance `number` of a widget type with the given display arguments.
    fn render_widget(
        &self,
        widget_type: &WidgetType,
        number: u32,
        settings: &SettingsRecord,
        args: &RenderArgs,
    ) -> String;
}

/// Host backed by a static site definition.
#[derive(Debug, Clone)]
pub struct StaticHost {
    site: SiteDefinition,
}

impl StaticHost {
    /// Creates a host serving `site`.
    #[must_use]
    pub fn new(site: SiteDefinition) -> Self {
        Self { site }
    }

    /// The site definition this host serves.
    #[must_use]
    pub fn site(&self) -> &SiteDefinition {
        &self.site
    }
}

impl WidgetHost for StaticHost {
    fn sidebars(&self) -> Vec<Sidebar> {
        self.site.sidebars.clone()
    }

    fn widget_types(&self) -> Vec<WidgetType> {
        self.site.widget_types.clone()
    }

    fn render_form(&self, widget_type: &WidgetType, index: &str) -> String {
        widget_type.form.replace(FORM_INDEX_PLACEHOLDER, index)
    }

    fn render_widget(
        &self,
        widget_type: &WidgetType,
        number: u32,
        settings: &SettingsRecord,
        args: &RenderArgs,
    ) -> String {
        let mut output = args.before_widget.clone();

        let title = settings.get("title").map(setting_text).unwrap_or_default();
        if !title.is_empty() {
            output.push_str(&args.before_title);
            output.push_str(&escape_html(&title));
            output.push_str(&args.after_title);
        }

        output.push_str(&fill_template(&widget_type.output, number, settings));
        output.push_str(&args.after_widget);
        output
    }
}

/// Replaces every `{{field}}` in `template` with the escaped setting value.
///
/// `{{number}}` falls back to the instance number when no setting has that
/// name. Other unknown fields render as the empty string; an unterminated
/// `{{` is copied through unchanged.
fn fill_template(template: &str, number: u32, settings: &SettingsRecord) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            return output;
        };
        let field = after_open[..end].trim();
        match settings.get(field) {
            Some(value) => output.push_str(&escape_html(&setting_text(value))),
            None if field == "number" => output.push_str(&number.to_string()),
            None => {}
        }
        rest = &after_open[end + 2..];
    }

    output.push_str(rest);
    output
}

/// Text form of a setting value (strings unquoted, null empty).
fn setting_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
