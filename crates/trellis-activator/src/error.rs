//! Activation errors
//!
//! A reconcile call produces at most one [`ActivationError`] per target and
//! surfaces them together as an [`AggregateError`]. Each cause keeps the
//! schema or controller it relates to.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Why a single target could not be activated
#[derive(Debug, Error)]
pub enum ActivationError {
    /// The readiness probe failed with something other than "not found"
    #[error("failed to probe availability of '{gvk}': {source}")]
    Probe {
        /// Schema being waited on
        gvk: String,
        /// Probe failure
        source: trellis_common::Error,
    },

    /// The schema was not served within the readiness window
    #[error("failed to wait for resource '{gvk}' to be available: timed out after {timeout:?}")]
    ReadinessTimeout {
        /// Schema being waited on
        gvk: String,
        /// Length of the readiness window
        timeout: Duration,
    },

    /// The caller cancelled before the target was activated
    #[error("activation of '{gvk}' cancelled")]
    Cancelled {
        /// Schema of the target being activated
        gvk: String,
    },

    /// The controller could not be registered with the runtime
    #[error("failed to setup controller {controller}: {source}")]
    Setup {
        /// Name of the controller
        controller: String,
        /// Registration failure
        source: trellis_common::Error,
    },
}

impl ActivationError {
    /// Schema identity for readiness-related failures
    pub fn gvk(&self) -> Option<&str> {
        match self {
            Self::Probe { gvk, .. } | Self::ReadinessTimeout { gvk, .. } | Self::Cancelled { gvk } => {
                Some(gvk)
            }
            Self::Setup { .. } => None,
        }
    }

    /// Controller name for setup failures
    pub fn controller(&self) -> Option<&str> {
        match self {
            Self::Setup { controller, .. } => Some(controller),
            _ => None,
        }
    }
}

/// All per-target failures of one reconcile call.
///
/// Never empty: a call where every target succeeded returns `Ok(())`.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<ActivationError>,
}

impl AggregateError {
    /// `Ok(())` when `errors` is empty, otherwise the aggregate
    pub fn check(errors: Vec<ActivationError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }

    /// Individual causes, in target order
    pub fn errors(&self) -> &[ActivationError] {
        &self.errors
    }

    /// Iterate over the causes
    pub fn iter(&self) -> std::slice::Iter<'_, ActivationError> {
        self.errors.iter()
    }

    /// Number of causes
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false; present for symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Take ownership of the causes
    pub fn into_errors(self) -> Vec<ActivationError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl<'a> IntoIterator for &'a AggregateError {
    type Item = &'a ActivationError;
    type IntoIter = std::slice::Iter<'a, ActivationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
