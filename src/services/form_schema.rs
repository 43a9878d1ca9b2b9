//! Best-effort settings schema inferred from a widget's configuration form.
//!
//! The host renders the form for the sentinel index `__i__`, which yields ids
//! such as `widget-text-__i__-title`. Every `<input>`, `<textarea>`, and
//! `<select>` carrying such an id contributes one field named after the text
//! that follows the last `__i__-` marker.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::constants::FORM_INDEX_PLACEHOLDER;
use crate::models::SettingsRecord;

/// Kind of form control a field was inferred from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single-line input (`text`, `url`, `email`, and unknown input types)
    Text,
    /// Checkbox or radio input
    Checkbox,
    /// Numeric input
    Number,
    /// Multi-line text area
    Textarea,
    /// Drop-down select box
    Select,
}

/// One inferred settings field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredField {
    /// Field name (the id suffix after `__i__-`)
    pub name: String,
    /// Control kind
    pub kind: FieldKind,
}

/// Fields inferred for one widget base type, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferredSchema {
    /// Inferred fields, duplicates removed
    pub fields: Vec<InferredField>,
}

impl InferredSchema {
    /// Whether a field with this name was inferred.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }

    /// Field names in discovery order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Initial record for a first instance: every field set to `""`.
    #[must_use]
    pub fn seed_record(&self) -> SettingsRecord {
        self.names()
            .map(|name| (name.to_string(), Value::String(String::new())))
            .collect()
    }

    fn push(&mut self, name: &str, kind: FieldKind) {
        if !self.contains(name) {
            self.fields.push(InferredField {
                name: name.to_string(),
                kind,
            });
        }
    }
}

/// Scans form markup for settings fields.
#[derive(Debug, Clone)]
pub struct FormSchemaInferrer {
    input_tag: Regex,
    textarea_tag: Regex,
    select_tag: Regex,
    id_attr: Regex,
    type_attr: Regex,
}

impl FormSchemaInferrer {
    /// Compiles the tag and attribute patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            input_tag: Regex::new(r"(?is)<input\b([^>]*)>")?,
            textarea_tag: Regex::new(r"(?is)<textarea\b([^>]*)>")?,
            select_tag: Regex::new(r"(?is)<select\b([^>]*)>")?,
            id_attr: attribute_regex("id")?,
            type_attr: attribute_regex("type")?,
        })
    }

    /// Infers the schema of `form`.
    ///
    /// Inputs are scanned first, then text areas, then selects; within each
    /// group fields follow document order. Markup without recognizable fields
    /// yields an empty schema.
    #[must_use]
    pub fn infer(&self, form: &str) -> InferredSchema {
        let mut schema = InferredSchema::default();

        for captures in self.input_tag.captures_iter(form) {
            let attrs = captures.get(1).map_or("", |m| m.as_str());
            let kind = match attribute(attrs, &self.type_attr).as_deref() {
                Some(t) if t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio") => {
                    FieldKind::Checkbox
                }
                Some(t) if t.eq_ignore_ascii_case("number") || t.eq_ignore_ascii_case("range") => {
                    FieldKind::Number
                }
                _ => FieldKind::Text,
            };
            self.collect(&mut schema, attrs, kind);
        }

        for (tag, kind) in [
            (&self.textarea_tag, FieldKind::Textarea),
            (&self.select_tag, FieldKind::Select),
        ] {
            for captures in tag.captures_iter(form) {
                let attrs = captures.get(1).map_or("", |m| m.as_str());
                self.collect(&mut schema, attrs, kind);
            }
        }

        schema
    }

    fn collect(&self, schema: &mut InferredSchema, attrs: &str, kind: FieldKind) {
        if let Some(id) = attribute(attrs, &self.id_attr) {
            if let Some(name) = field_name(&id) {
                schema.push(name, kind);
            }
        }
    }
}

/// Value of the attribute matched by `pattern`, whichever quoting it used.
fn attribute(attrs: &str, pattern: &Regex) -> Option<String> {
    let captures = pattern.captures(attrs)?;
    (1..=3)
        .find_map(|group| captures.get(group))
        .map(|m| m.as_str().to_string())
}

/// Matches `name=` with a double-quoted, single-quoted, or bare value.
fn attribute_regex(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r#"(?i)(?:^|\s){name}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#
    ))
}

/// Text after the last `__i__-` marker, if any.
fn field_name(id: &str) -> Option<&str> {
    let marker = format!("{FORM_INDEX_PLACEHOLDER}-");
    let start = id.rfind(&marker)? + marker.len();
    let name = &id[start..];
    (!name.is_empty()).then_some(name)
}
