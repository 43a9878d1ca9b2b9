//! Permission hooks consulted before each endpoint operation.
//!
//! A hook returns a JSON verdict per operation. `true` permits the request and
//! `false` denies it; any other value is a broken hook and is reported as an
//! invalid operation rather than as a denial.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use serde_json::Value;

use crate::config::Config;
use crate::error::{WidgetError, WidgetResult};

/// Operations guarded by a permission hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// List sidebars
    GetSidebars,
    /// Read one sidebar
    GetSidebar,
    /// List widgets or widget types
    GetWidgets,
    /// Read one widget
    GetWidget,
    /// Create a widget
    CreateWidget,
    /// Update, move or reposition a widget
    UpdateWidget,
    /// Delete a widget
    DeleteWidget,
}

impl Operation {
    /// Every guarded operation.
    pub const ALL: [Self; 7] = [
        Self::GetSidebars,
        Self::GetSidebar,
        Self::GetWidgets,
        Self::GetWidget,
        Self::CreateWidget,
        Self::UpdateWidget,
        Self::DeleteWidget,
    ];

    /// Config key of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetSidebars => "get_sidebars",
            Self::GetSidebar => "get_sidebar",
            Self::GetWidgets => "get_widgets",
            Self::GetWidget => "get_widget",
            Self::CreateWidget => "create_widget",
            Self::UpdateWidget => "update_widget",
            Self::DeleteWidget => "delete_widget",
        }
    }

    /// Parses a config key.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Operation whose verdict applies when this one has none configured.
    #[must_use]
    pub const fn fallback(self) -> Option<Self> {
        match self {
            Self::UpdateWidget | Self::DeleteWidget => Some(Self::CreateWidget),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-supplied permission predicate.
pub trait PermissionHook: Send + Sync {
    /// Verdict for an operation; should be a JSON boolean.
    fn verdict(&self, operation: Operation) -> Value;
}

/// Permits every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl PermissionHook for PermitAll {
    fn verdict(&self, _operation: Operation) -> Value {
        Value::Bool(true)
    }
}

/// Verdicts read from the `[permissions]` config table.
///
/// Unset operations use their fallback's verdict, then `true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPermissions {
    verdicts: BTreeMap<Operation, Value>,
}

impl ConfigPermissions {
    /// Creates an empty table (permits everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the verdict of one operation.
    #[must_use]
    pub fn with(mut self, operation: Operation, verdict: Value) -> Self {
        self.verdicts.insert(operation, verdict);
        self
    }

    /// Builds the table from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut permissions = Self::new();
        for (name, value) in &config.permissions {
            let operation = Operation::from_name(name)
                .with_context(|| format!("Unknown operation in [permissions]: '{name}'"))?;
            let verdict = serde_json::to_value(value)
                .with_context(|| format!("Invalid permission value for '{name}'"))?;
            permissions.verdicts.insert(operation, verdict);
        }
        Ok(permissions)
    }
}

impl PermissionHook for ConfigPermissions {
    fn verdict(&self, operation: Operation) -> Value {
        self.verdicts
            .get(&operation)
            .or_else(|| operation.fallback().and_then(|op| self.verdicts.get(&op)))
            .cloned()
            .unwrap_or(Value::Bool(true))
    }
}

/// Consults `hook` for `operation`.
///
/// # Errors
///
/// Returns `Forbidden` on a `false` verdict and `InvalidOperation` on a
/// non-boolean one.
pub fn authorize(hook: &dyn PermissionHook, operation: Operation) -> WidgetResult<()> {
    match hook.verdict(operation) {
        Value::Bool(true) => Ok(()),
        Value::Bool(false) => Err(WidgetError::forbidden(format!(
            "Sorry, you are not allowed to {}",
            operation.as_str().replace('_', " ")
        ))),
        other => Err(WidgetError::invalid_operation(format!(
            "Permission hook for {operation} returned {other}; it must return a boolean: \
             FALSE for no permissions, TRUE for permissions"
        ))),
    }
}
