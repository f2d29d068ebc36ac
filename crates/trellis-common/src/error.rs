//! Error types shared across Trellis crates
//!
//! Errors are structured with fields to aid debugging in production.
//! Variants carry the schema, controller, or field they relate to so a
//! caller can tell which collaborator failed without parsing messages.

use thiserror::Error;

/// Main error type for Trellis operations
#[derive(Debug, Error)]
pub enum Error {
    /// API discovery failed for reasons other than the group/version being absent
    #[error("discovery error for {group_version}: {message}")]
    Discovery {
        /// Group/version being probed (e.g. "security.istio.io/v1")
        group_version: String,
        /// Description of what failed
        message: String,
    },

    /// A controller could not be registered with the controller runtime
    #[error("registration error for controller {controller}: {message}")]
    Registration {
        /// Name of the controller being registered
        controller: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid configuration value
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The offending field or environment variable
        field: String,
    },
}

impl Error {
    /// Create a discovery error for a group/version
    pub fn discovery(group_version: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Discovery {
            group_version: group_version.into(),
            message: msg.into(),
        }
    }

    /// Create a registration error for a controller
    pub fn registration(controller: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Registration {
            controller: controller.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: field.into(),
        }
    }

    /// Get the offending field if this is a validation error
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}
