//! Authorization capability types
//!
//! Trellis does not interpret these values; they are handed to the
//! authorization controllers created for each protected resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_common::{HasResourceReference, ResourceReference};

/// Settings of the external authorization provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Label selecting the auth config objects handled by the provider
    pub label: String,
    /// Token audiences accepted by the provider
    #[serde(default)]
    pub audiences: Vec<String>,
    /// Name of the provider as registered in the mesh
    pub provider_name: String,
}

/// A resource whose workloads require authorization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedResource {
    /// Identity of the protected resource
    pub resource_reference: ResourceReference,
    /// Labels selecting the workloads serving the resource
    #[serde(default)]
    pub workload_selector: BTreeMap<String, String>,
    /// Paths on the resource's hosts that require authorization
    #[serde(default)]
    pub host_paths: Vec<String>,
    /// Ports the policy applies to
    #[serde(default)]
    pub ports: Vec<String>,
}

impl ProtectedResource {
    /// Protect a resource with no extra selectors, paths or ports
    pub fn new(resource_reference: ResourceReference) -> Self {
        Self {
            resource_reference,
            workload_selector: BTreeMap::new(),
            host_paths: Vec::new(),
            ports: Vec::new(),
        }
    }
}

impl HasResourceReference for ProtectedResource {
    fn resource_reference(&self) -> &ResourceReference {
        &self.resource_reference
    }
}
