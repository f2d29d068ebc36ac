//! Capability activator for Trellis
//!
//! Decides which per-resource capability controllers exist for a desired set
//! of targets:
//! - waits for each target's schema to be served before creating anything
//! - creates and registers controllers for new targets in parallel
//! - re-applies configuration to known targets
//! - deactivates controllers whose targets are no longer desired

#![deny(missing_docs)]

pub mod activator;
pub mod config;
pub mod controller;
pub mod error;
pub mod probe;

pub use activator::CapabilityActivator;
pub use config::{ActivatorConfig, ActivatorEnv, OsEnv};
pub use controller::{ActivableController, ControllerRuntime, ControllerState};
pub use error::{ActivationError, AggregateError};
pub use probe::{DiscoveryProbe, ReadinessProbe};
