//! Error types for placement and instance operations.
//!
//! The placement engine and the services raise [`WidgetError`]; the web layer
//! translates each kind into an HTTP status and a machine-readable code.

use thiserror::Error;

/// Result alias used by the engine and services.
pub type WidgetResult<T> = Result<T, WidgetError>;

/// Errors from placement, instance, and permission operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WidgetError {
    /// Unknown sidebar or widget id in a read or write request.
    #[error("{message}")]
    InvalidReference {
        /// Description of the bad reference.
        message: String,
    },

    /// A permission hook returned something other than a boolean.
    #[error("{message}")]
    InvalidOperation {
        /// Description of the contract violation.
        message: String,
    },

    /// A permission hook denied the request.
    #[error("{message}")]
    Forbidden {
        /// Description of the denied operation.
        message: String,
    },

    /// Update or delete targeted an instance that does not exist.
    #[error("{message}")]
    NotFound {
        /// Description of the missing instance.
        message: String,
    },

    /// The placement map violates the one-sidebar-per-widget invariant.
    #[error("placement invariant violated: {message}")]
    InternalInconsistency {
        /// Description of the violation.
        message: String,
    },

    /// The option store failed to read or write.
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl WidgetError {
    /// Creates an [`WidgetError::InvalidReference`].
    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::InvalidReference {
            message: message.into(),
        }
    }

    /// Creates an [`WidgetError::InvalidOperation`].
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a [`WidgetError::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a [`WidgetError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a [`WidgetError::InternalInconsistency`].
    pub fn inconsistency(message: impl Into<String>) -> Self {
        Self::InternalInconsistency {
            message: message.into(),
        }
    }

    /// Machine-readable error code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "invalid_reference",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::InternalInconsistency { .. } => "internal_inconsistency",
            Self::Storage(_) => "storage_error",
        }
    }

    /// HTTP-style status code for this error kind.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidReference { .. } | Self::InvalidOperation { .. } => 400,
            Self::Forbidden { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::InternalInconsistency { .. } | Self::Storage(_) => 500,
        }
    }
}
