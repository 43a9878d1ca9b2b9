//! Shared test fixtures for the HTTP integration tests.
#![allow(dead_code)] // Not every test file uses every fixture

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;
use widget_rest::config::{Config, PathConfig, ServerConfig};

/// Site definition with two sidebars and three widget types.
///
/// `footer` has an empty `before_widget`, so widgets in it render with the
/// default display arguments.
pub const TEST_SITE: &str = r#"
[[sidebars]]
id = "sidebar-1"
name = "Main Sidebar"
description = "Beside the content"

[[sidebars]]
id = "footer"
name = "Footer"
before_widget = ""

[[widget_types]]
id_base = "text"
name = "Text"
description = "Arbitrary text"
form = '''
<input id="widget-text-__i__-title" name="widget-text[__i__][title]" type="text" value="">
<textarea id="widget-text-__i__-text" name="widget-text[__i__][text]"></textarea>
'''
output = "<p>{{text}}</p>"

[[widget_types]]
id_base = "search"
name = "Search"
form = '<input id="widget-search-__i__-title" type="text">'
output = "<form></form>"

[[widget_types]]
id_base = "recent-posts"
name = "Recent Posts"
form = '''
<input id="widget-recent-posts-__i__-title" type="text">
<input id="widget-recent-posts-__i__-number" type="number">
<input id="widget-recent-posts-__i__-show_date" type="checkbox">
'''
output = "<ul data-count=\"{{number}}\"></ul>"
"#;

/// Writes [`TEST_SITE`] into `dir` and returns its path.
pub fn write_site_file(dir: &Path) -> PathBuf {
    let path = dir.join("site.toml");
    fs::write(&path, TEST_SITE).expect("Failed to write site file");
    path
}

/// Config pointing at a test site and a data file inside a temp dir.
pub fn temp_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let site_file = write_site_file(temp_dir.path());

    let config = Config {
        server: ServerConfig::default(),
        paths: PathConfig {
            site_file: Some(site_file),
            data_file: Some(temp_dir.path().join("options.json")),
        },
        permissions: Default::default(),
    };

    (config, temp_dir)
}

/// Reads the option store file written by the server.
pub fn read_options(dir: &Path) -> Value {
    let path = dir.join("options.json");
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).expect("Option store is not JSON"),
        Err(_) => json!({}),
    }
}
