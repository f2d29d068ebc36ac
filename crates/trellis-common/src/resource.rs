//! Resource identity types
//!
//! A [`ResourceReference`] is the key under which capability controllers are
//! tracked. It combines the schema coordinates of a resource with its
//! name and namespace, and is cheap to hash and compare.

use std::fmt;

use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Schema coordinates served by the API server (`group/version`).
///
/// An empty group denotes the core API group, whose api version is just
/// the version (e.g. `v1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    /// API group (empty for core)
    pub group: String,
    /// API version within the group
    pub version: String,
}

impl GroupVersion {
    /// Create a group/version pair
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// Whether this is the core (legacy, groupless) API
    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }

    /// The `apiVersion` string as it appears in manifests
    pub fn api_version(&self) -> String {
        if self.is_core() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

/// Identity of a concrete resource a capability is applied to.
///
/// Two references are equal iff group, version, kind, name and namespace
/// all match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// API group of the resource's schema
    pub group: String,
    /// API version of the resource's schema
    pub version: String,
    /// Kind of the resource
    pub kind: String,
    /// Resource name
    pub name: String,
    /// Namespace, `None` for cluster-scoped resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceReference {
    /// Create a reference to a namespaced resource
    pub fn namespaced(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Create a reference to a cluster-scoped resource
    pub fn cluster_scoped(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Derive a reference from a typed kube object
    pub fn for_object<K>(obj: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            name: obj.name_any(),
            namespace: obj.namespace(),
        }
    }

    /// Schema coordinates this resource is served under
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(&self.group, &self.version)
    }

    /// Human readable schema identity, e.g. `security.istio.io/v1, Kind=AuthorizationPolicy`
    pub fn gvk_string(&self) -> String {
        format!("{}, Kind={}", self.group_version(), self.kind)
    }
}

impl fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.gvk_string(), ns, self.name),
            None => write!(f, "{} {}", self.gvk_string(), self.name),
        }
    }
}

/// Anything that identifies the resource a capability targets.
pub trait HasResourceReference {
    /// The reference used as the controller store key
    fn resource_reference(&self) -> &ResourceReference;
}

impl HasResourceReference for ResourceReference {
    fn resource_reference(&self) -> &ResourceReference {
        self
    }
}
