//! Site definition file: the sidebars and widget types a [`StaticHost`] serves.
//!
//! ```toml
//! [[sidebars]]
//! id = "sidebar-1"
//! name = "Main Sidebar"
//!
//! [[widget_types]]
//! id_base = "text"
//! name = "Text"
//! form = '<input id="widget-text-__i__-title" name="widget-text[__i__][title]" type="text">'
//! output = "<div class=\"textwidget\">{{text}}</div>"
//! ```
//!
//! [`StaticHost`]: super::StaticHost

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{Sidebar, WidgetId, WidgetType};

/// Sidebars and widget types registered by a site.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SiteDefinition {
    /// Registered sidebars, in display order
    #[serde(default)]
    pub sidebars: Vec<Sidebar>,
    /// Registered widget types
    #[serde(default)]
    pub widget_types: Vec<WidgetType>,
}

impl SiteDefinition {
    /// Loads and validates a site definition from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read site file: {}", path.display()))?;
        let site = Self::from_toml(&content)
            .with_context(|| format!("Invalid site file: {}", path.display()))?;
        Ok(site)
    }

    /// Parses and validates a site definition from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let site: Self = toml::from_str(content).context("Failed to parse site definition")?;
        site.validate()?;
        Ok(site)
    }

    /// Checks ids are unique and that every widget base forms valid widget ids.
    pub fn validate(&self) -> Result<()> {
        let mut sidebar_ids = HashSet::new();
        for sidebar in &self.sidebars {
            if sidebar.id.trim().is_empty() {
                anyhow::bail!("Sidebar '{}' has an empty id", sidebar.name);
            }
            if !sidebar_ids.insert(sidebar.id.as_str()) {
                anyhow::bail!("Duplicate sidebar id: {}", sidebar.id);
            }
        }

        let mut bases = HashSet::new();
        for widget_type in &self.widget_types {
            let base = widget_type.id_base.as_str();
            // "{base}-1" must parse back to the same base, so "text-2" is not a usable base.
            let round_trip = WidgetId::parse(&format!("{base}-1"));
            if round_trip.as_ref().map(WidgetId::id_base) != Some(base)
                || WidgetId::parse(base).is_some()
            {
                anyhow::bail!("Invalid widget base id: '{base}'");
            }
            if !bases.insert(base) {
                anyhow::bail!("Duplicate widget base id: {base}");
            }
        }

        Ok(())
    }

    /// The site served when no site file is configured: two sidebars and a
    /// handful of common widget types.
    #[must_use]
    pub fn builtin() -> Self {
        let mut footer = Sidebar::new("sidebar-2", "Footer");
        footer.description = "Widgets shown in the page footer".to_string();
        footer.before_widget = r#"<div id="%1$s" class="footer-widget %2$s">"#.to_string();
        footer.after_widget = "</div>\n".to_string();

        let mut main = Sidebar::new("sidebar-1", "Main Sidebar");
        main.description = "Widgets shown beside the content".to_string();

        let mut text = WidgetType::new("text", "Text")
            .with_form(concat!(
                r#"<p><label for="widget-text-__i__-title">Title:</label>"#,
                r#"<input class="widefat" id="widget-text-__i__-title" name="widget-text[__i__][title]" type="text" value="" /></p>"#,
                r#"<textarea class="widefat" rows="16" cols="20" id="widget-text-__i__-text" name="widget-text[__i__][text]"></textarea>"#,
                r#"<p><input id="widget-text-__i__-filter" name="widget-text[__i__][filter]" type="checkbox" />"#,
                r#"<label for="widget-text-__i__-filter">Automatically add paragraphs</label></p>"#,
            ))
            .with_output(r#"<div class="textwidget">{{text}}</div>"#);
        text.description = "Arbitrary text or HTML".to_string();

        let mut search = WidgetType::new("search", "Search")
            .with_form(concat!(
                r#"<p><label for="widget-search-__i__-title">Title:</label>"#,
                r#"<input class="widefat" id="widget-search-__i__-title" name="widget-search[__i__][title]" type="text" value="" /></p>"#,
            ))
            .with_output(r#"<form role="search" method="get" class="search-form"><input type="search" name="s" /></form>"#);
        search.description = "A search form for your site".to_string();

        let mut pages = WidgetType::new("pages", "Pages")
            .with_form(concat!(
                r#"<input class="widefat" id="widget-pages-__i__-title" name="widget-pages[__i__][title]" type="text" value="" />"#,
                r#"<select id="widget-pages-__i__-sortby" name="widget-pages[__i__][sortby]" class="widefat">"#,
                r#"<option value="post_title">Page title</option><option value="menu_order">Page order</option></select>"#,
                r#"<input type="text" value="" name="widget-pages[__i__][exclude]" id="widget-pages-__i__-exclude" class="widefat" />"#,
            ))
            .with_output(r#"<ul class="pages" data-sort="{{sortby}}"></ul>"#);
        pages.description = "A list of your site's pages".to_string();

        let mut recent_posts = WidgetType::new("recent-posts", "Recent Posts")
            .with_form(concat!(
                r#"<input class="widefat" id="widget-recent-posts-__i__-title" name="widget-recent-posts[__i__][title]" type="text" value="" />"#,
                r#"<input class="tiny-text" id="widget-recent-posts-__i__-number" name="widget-recent-posts[__i__][number]" type="number" step="1" min="1" value="5" size="3" />"#,
                r#"<input class="checkbox" type="checkbox" id="widget-recent-posts-__i__-show_date" name="widget-recent-posts[__i__][show_date]" />"#,
            ))
            .with_output(r#"<ul class="recent-posts" data-count="{{number}}"></ul>"#);
        recent_posts.classname = "widget_recent_entries".to_string();
        recent_posts.description = "Your site's most recent posts".to_string();

        Self {
            sidebars: vec![main, footer],
            widget_types: vec![text, search, pages, recent_posts],
        }
    }
}
