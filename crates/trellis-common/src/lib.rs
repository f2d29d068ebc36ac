//! Common types for Trellis: resource identity, errors, polling and telemetry

#![deny(missing_docs)]

pub mod error;
pub mod poll;
pub mod resource;
pub mod telemetry;

pub use error::Error;
pub use resource::{GroupVersion, HasResourceReference, ResourceReference};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
