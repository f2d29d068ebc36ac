//! Platform orchestrator
//!
//! Exposes the authorization and routing capabilities over one
//! [`CapabilityActivator`] each. The two capabilities share the readiness
//! probe and controller runtime but no state; toggling one never waits on
//! the other.

use std::sync::Arc;

use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use trellis_activator::{
    ActivableController, ActivatorConfig, AggregateError, CapabilityActivator, ControllerRuntime,
    DiscoveryProbe, OsEnv, ReadinessProbe,
};

use crate::authorization::{ProtectedResource, ProviderConfig};
use crate::routing::{IngressConfig, RoutingTarget};

/// Capability label for authorization controllers
pub const AUTHORIZATION_CAPABILITY: &str = "authorization";

/// Capability label for routing controllers
pub const ROUTING_CAPABILITY: &str = "routing";

/// Builds the concrete controller for one target of a capability.
///
/// Implementations own whatever the controller needs (typically a kube
/// client) and return it unregistered.
pub trait ControllerFactory<C, T>: Send + Sync {
    /// Create a controller for `target` configured with `config`
    fn create(&self, target: &T, config: &C) -> Arc<dyn ActivableController<C>>;
}

/// Factory for authorization controllers
pub type AuthorizationFactory = Arc<dyn ControllerFactory<ProviderConfig, ProtectedResource>>;

/// Factory for routing controllers
pub type RoutingFactory = Arc<dyn ControllerFactory<IngressConfig, RoutingTarget>>;

/// Manages the lifecycle of platform capabilities and their controllers
pub struct PlatformOrchestrator {
    authorization: CapabilityActivator<ProviderConfig, ProtectedResource>,
    authorization_controllers: AuthorizationFactory,
    routing: CapabilityActivator<IngressConfig, RoutingTarget>,
    routing_controllers: RoutingFactory,
}

impl PlatformOrchestrator {
    /// Wire an orchestrator from explicit collaborators.
    ///
    /// Fails if `config` is not a usable readiness policy.
    pub fn new(
        probe: Arc<dyn ReadinessProbe>,
        runtime: Arc<ControllerRuntime>,
        authorization_controllers: AuthorizationFactory,
        routing_controllers: RoutingFactory,
        config: ActivatorConfig,
    ) -> trellis_common::Result<Self> {
        Ok(Self {
            authorization: CapabilityActivator::new(
                AUTHORIZATION_CAPABILITY,
                probe.clone(),
                runtime.clone(),
            )
            .with_config(config)?,
            authorization_controllers,
            routing: CapabilityActivator::new(ROUTING_CAPABILITY, probe, runtime)
                .with_config(config)?,
            routing_controllers,
        })
    }

    /// Build an orchestrator probing schemas through API discovery.
    ///
    /// The readiness policy is read from the process environment.
    pub fn from_client(
        client: Client,
        runtime: Arc<ControllerRuntime>,
        authorization_controllers: AuthorizationFactory,
        routing_controllers: RoutingFactory,
    ) -> trellis_common::Result<Self> {
        let config = ActivatorConfig::from_env(&OsEnv)?;
        Self::new(
            Arc::new(DiscoveryProbe::new(client)),
            runtime,
            authorization_controllers,
            routing_controllers,
            config,
        )
    }

    /// Apply authorization to exactly `targets`, deactivating it elsewhere
    #[instrument(skip_all, fields(provider = %config.provider_name))]
    pub async fn toggle_authorization(
        &self,
        cancel: &CancellationToken,
        config: ProviderConfig,
        targets: &[ProtectedResource],
    ) -> Result<(), AggregateError> {
        let factory = self.authorization_controllers.as_ref();
        self.authorization
            .reconcile(
                cancel,
                targets,
                &config,
                |target, config| factory.create(target, config),
                |controller, config| controller.activate(config.clone()),
            )
            .await
    }

    /// Route exactly `targets`, deactivating routing elsewhere
    #[instrument(skip_all, fields(gateway_namespace = %config.gateway_namespace))]
    pub async fn toggle_routing(
        &self,
        cancel: &CancellationToken,
        config: IngressConfig,
        targets: &[RoutingTarget],
    ) -> Result<(), AggregateError> {
        let factory = self.routing_controllers.as_ref();
        self.routing
            .reconcile(
                cancel,
                targets,
                &config,
                |target, config| factory.create(target, config),
                |controller, config| controller.activate(config.clone()),
            )
            .await
    }

    /// Activator holding the authorization controllers
    pub fn authorization(&self) -> &CapabilityActivator<ProviderConfig, ProtectedResource> {
        &self.authorization
    }

    /// Activator holding the routing controllers
    pub fn routing(&self) -> &CapabilityActivator<IngressConfig, RoutingTarget> {
        &self.routing
    }
}
