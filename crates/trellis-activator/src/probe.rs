//! Schema readiness probe
//!
//! Controllers watch resources whose CRDs may be installed after Trellis
//! starts. The probe answers whether a group/version is currently served,
//! distinguishing "not installed yet" (a normal negative answer) from a
//! failed probe.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use trellis_common::{Error, GroupVersion};

/// Answers whether the cluster serves a given schema
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `Ok(false)` when the group/version is simply not registered yet,
    /// `Err` only when the probe itself failed.
    async fn is_ready(&self, group_version: &GroupVersion) -> Result<bool, Error>;
}

/// Probe backed by the API server's discovery endpoints
#[derive(Clone)]
pub struct DiscoveryProbe {
    client: Client,
}

impl DiscoveryProbe {
    /// Create a probe using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReadinessProbe for DiscoveryProbe {
    async fn is_ready(&self, group_version: &GroupVersion) -> Result<bool, Error> {
        let result = if group_version.is_core() {
            self.client
                .list_core_api_resources(&group_version.version)
                .await
        } else {
            self.client
                .list_api_group_resources(&group_version.api_version())
                .await
        };

        let ready = classify_discovery(group_version, result)?;
        debug!(group_version = %group_version, ready, "probed schema availability");
        Ok(ready)
    }
}

/// Map a discovery response to a readiness answer.
///
/// A 404 means the group/version is not registered; any other failure is a
/// probe error.
pub fn classify_discovery(
    group_version: &GroupVersion,
    result: Result<APIResourceList, kube::Error>,
) -> Result<bool, Error> {
    match result {
        Ok(list) => Ok(!list.resources.is_empty()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(e) => Err(Error::discovery(group_version.to_string(), e.to_string())),
    }
}
