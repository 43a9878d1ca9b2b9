//! Widget identifiers and widget type definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WidgetError;

/// Identifier of one widget instance: `{id_base}-{number}`.
///
/// The base may itself contain dashes (`recent-posts-3` has base
/// `recent-posts`); the number is everything after the last dash and must be a
/// positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WidgetId {
    id_base: String,
    number: u32,
}

impl WidgetId {
    /// Creates a widget id from its parts.
    pub fn new(id_base: impl Into<String>, number: u32) -> Self {
        Self {
            id_base: id_base.into(),
            number,
        }
    }

    /// Parses `{base}-{number}`, returning `None` for anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use widget_rest::models::WidgetId;
    ///
    /// let id = WidgetId::parse("recent-posts-3").unwrap();
    /// assert_eq!(id.id_base(), "recent-posts");
    /// assert_eq!(id.number(), 3);
    /// assert!(WidgetId::parse("text").is_none());
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let (base, digits) = raw.rsplit_once('-')?;
        if base.is_empty()
            || digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || !base.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return None;
        }
        let number: u32 = digits.parse().ok()?;
        if number == 0 {
            return None;
        }
        Some(Self::new(base, number))
    }

    /// The widget base type (e.g. "text").
    #[must_use]
    pub fn id_base(&self) -> &str {
        &self.id_base
    }

    /// The instance number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.id_base, self.number)
    }
}

impl FromStr for WidgetId {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| WidgetError::invalid_reference(format!("Invalid widget ID: {s}")))
    }
}

impl TryFrom<String> for WidgetId {
    type Error = WidgetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WidgetId> for String {
    fn from(id: WidgetId) -> Self {
        id.to_string()
    }
}

/// A kind of widget registered by the host.
///
/// `form` is the configuration form markup as the host renders it for the
/// sentinel index (`__i__`); `output` is the display template, where
/// `{{field}}` is replaced by the instance's setting of that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetType {
    /// Base id shared by every instance (e.g. "text")
    pub id_base: String,
    /// Human-readable name
    pub name: String,
    /// CSS class name (defaults to `widget_{id_base}`)
    #[serde(default)]
    pub classname: String,
    /// Description of the widget's purpose
    #[serde(default)]
    pub description: String,
    /// Configuration form markup
    #[serde(default)]
    pub form: String,
    /// Display template
    #[serde(default)]
    pub output: String,
}

impl WidgetType {
    /// Creates a widget type with empty form and output templates.
    pub fn new(id_base: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id_base: id_base.into(),
            name: name.into(),
            classname: String::new(),
            description: String::new(),
            form: String::new(),
            output: String::new(),
        }
    }

    /// Sets the form markup.
    #[must_use]
    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = form.into();
        self
    }

    /// Sets the output template.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    /// Effective CSS class name.
    #[must_use]
    pub fn classname(&self) -> String {
        if self.classname.is_empty() {
            format!("widget_{}", self.id_base)
        } else {
            self.classname.clone()
        }
    }
}
