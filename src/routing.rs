//! Routing capability types

use serde::{Deserialize, Serialize};
use trellis_common::{HasResourceReference, ResourceReference};

/// Where and how exposed resources are attached to the ingress gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    /// Label key selecting the ingress gateway pods
    pub ingress_selector_label: String,
    /// Label value selecting the ingress gateway pods
    pub ingress_selector_value: String,
    /// Service fronting the ingress gateway
    pub ingress_service: String,
    /// Namespace the gateway runs in
    pub gateway_namespace: String,
}

/// A resource that should be routable from outside the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingTarget {
    /// Identity of the routed resource
    pub resource_reference: ResourceReference,
}

impl RoutingTarget {
    /// Route the given resource
    pub fn new(resource_reference: ResourceReference) -> Self {
        Self { resource_reference }
    }
}

impl HasResourceReference for RoutingTarget {
    fn resource_reference(&self) -> &ResourceReference {
        &self.resource_reference
    }
}
