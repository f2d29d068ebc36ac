//! Trellis - lifecycle engine for platform capability controllers
//!
//! Platform capabilities such as authorization and routing are layered onto
//! existing cluster resources by dedicated per-resource controllers. Trellis
//! decides which of those controllers should exist, be updated, or be
//! deactivated as the set of targeted resources changes.
//!
//! # Modules
//!
//! - [`orchestrator`] - capability-named entry points over the generic activator
//! - [`authorization`] - authorization provider settings and protected resources
//! - [`routing`] - ingress settings and routing targets
//!
//! The engine itself lives in `trellis-activator`; identity types, errors
//! and telemetry live in `trellis-common`.

#![deny(missing_docs)]

pub mod authorization;
pub mod orchestrator;
pub mod routing;

pub use authorization::{ProtectedResource, ProviderConfig};
pub use orchestrator::{ControllerFactory, PlatformOrchestrator};
pub use routing::{IngressConfig, RoutingTarget};
pub use trellis_activator::{AggregateError, ActivationError, ControllerRuntime, ControllerState};
pub use trellis_common::{Error, ResourceReference, Result};
