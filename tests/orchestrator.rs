//! Integration tests for the platform orchestrator
//!
//! Drive both capabilities through the public API with an in-memory probe
//! and recording controllers; no cluster is required.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use trellis::orchestrator::{ControllerFactory, PlatformOrchestrator};
use trellis::{
    ActivationError, ControllerRuntime, ControllerState, Error, IngressConfig, ProtectedResource,
    ProviderConfig, ResourceReference, RoutingTarget,
};
use trellis_activator::{ActivableController, ActivatorConfig, ReadinessProbe};
use trellis_common::GroupVersion;

/// Serves every group except the ones listed
struct StaticProbe {
    missing: HashSet<String>,
}

#[async_trait]
impl ReadinessProbe for StaticProbe {
    async fn is_ready(&self, group_version: &GroupVersion) -> Result<bool, Error> {
        Ok(!self.missing.contains(&group_version.group))
    }
}

struct RecordingController<C> {
    name: String,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    last_config: Mutex<Option<C>>,
}

#[async_trait]
impl<C: Send + Sync + 'static> ActivableController<C> for RecordingController<C> {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn activate(&self, config: C) {
        self.activations.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(config);
    }

    fn deactivate(&self) {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
    }

    async fn register(
        &self,
        runtime: &ControllerRuntime,
        _cancel: &CancellationToken,
    ) -> Result<(), Error> {
        runtime.spawn(self.name.clone(), std::future::pending::<()>())
    }
}

struct RecordingFactory<C> {
    prefix: &'static str,
    created: Mutex<Vec<Arc<RecordingController<C>>>>,
}

impl<C> RecordingFactory<C> {
    fn new(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            created: Mutex::new(Vec::new()),
        })
    }

    fn created(&self) -> Vec<Arc<RecordingController<C>>> {
        self.created.lock().unwrap().clone()
    }
}

impl<C, T> ControllerFactory<C, T> for RecordingFactory<C>
where
    C: Send + Sync + 'static,
    T: trellis_common::HasResourceReference,
{
    fn create(&self, target: &T, _config: &C) -> Arc<dyn ActivableController<C>> {
        let reference = target.resource_reference();
        let controller = Arc::new(RecordingController {
            name: format!(
                "{}-ctrl-{}-{}",
                self.prefix,
                reference.namespace.as_deref().unwrap_or("cluster"),
                reference.name
            ),
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
            last_config: Mutex::new(None),
        });
        self.created.lock().unwrap().push(controller.clone());
        controller
    }
}

struct Fixture {
    orchestrator: PlatformOrchestrator,
    runtime: Arc<ControllerRuntime>,
    authz: Arc<RecordingFactory<ProviderConfig>>,
    routing: Arc<RecordingFactory<IngressConfig>>,
}

fn static_probe(missing_groups: &[&str]) -> Arc<StaticProbe> {
    Arc::new(StaticProbe {
        missing: missing_groups.iter().map(|g| g.to_string()).collect(),
    })
}

fn fixture(missing_groups: &[&str]) -> Fixture {
    let runtime = Arc::new(ControllerRuntime::new());
    let authz = RecordingFactory::new("authz");
    let routing = RecordingFactory::new("routing");

    let orchestrator = PlatformOrchestrator::new(
        static_probe(missing_groups),
        runtime.clone(),
        authz.clone(),
        routing.clone(),
        ActivatorConfig {
            poll_interval: Duration::from_millis(200),
            readiness_timeout: Duration::from_secs(2),
        },
    )
    .unwrap();

    Fixture {
        orchestrator,
        runtime,
        authz,
        routing,
    }
}

fn inference_service(name: &str) -> ResourceReference {
    ResourceReference::namespaced(
        "serving.kserve.io",
        "v1beta1",
        "InferenceService",
        "models",
        name,
    )
}

fn notebook(name: &str) -> ResourceReference {
    ResourceReference::namespaced("kubeflow.org", "v1", "Notebook", "workbenches", name)
}

fn provider(audience: &str) -> ProviderConfig {
    ProviderConfig {
        label: "security.opendatahub.io/authorization-group=default".to_string(),
        audiences: vec![audience.to_string()],
        provider_name: "authorino".to_string(),
    }
}

fn ingress() -> IngressConfig {
    IngressConfig {
        ingress_selector_label: "istio".to_string(),
        ingress_selector_value: "ingressgateway".to_string(),
        ingress_service: "istio-ingressgateway".to_string(),
        gateway_namespace: "istio-system".to_string(),
    }
}

#[tokio::test]
async fn toggling_authorization_creates_one_controller_per_resource() {
    let f = fixture(&[]);
    let cancel = CancellationToken::new();
    let targets = vec![
        ProtectedResource::new(inference_service("llama")),
        ProtectedResource::new(notebook("jupyter")),
    ];

    f.orchestrator
        .toggle_authorization(&cancel, provider("https://kubernetes.default.svc"), &targets)
        .await
        .unwrap();

    assert_eq!(f.authz.created().len(), 2);
    assert_eq!(
        f.orchestrator.authorization().active_references(),
        vec![notebook("jupyter"), inference_service("llama")]
    );
    assert_eq!(
        f.runtime.registered(),
        vec!["authz-ctrl-models-llama", "authz-ctrl-workbenches-jupyter"]
    );
    assert!(f.orchestrator.routing().is_empty());
}

#[tokio::test]
async fn new_provider_config_is_applied_to_existing_controllers() {
    let f = fixture(&[]);
    let cancel = CancellationToken::new();
    let targets = vec![ProtectedResource::new(inference_service("llama"))];

    f.orchestrator
        .toggle_authorization(&cancel, provider("aud-1"), &targets)
        .await
        .unwrap();
    f.orchestrator
        .toggle_authorization(&cancel, provider("aud-2"), &targets)
        .await
        .unwrap();

    let created = f.authz.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].activations.load(Ordering::SeqCst), 1);
    assert_eq!(
        created[0].last_config.lock().unwrap().as_ref(),
        Some(&provider("aud-2"))
    );
}

#[tokio::test]
async fn routing_removed_from_resource_is_deactivated() {
    let f = fixture(&[]);
    let cancel = CancellationToken::new();

    f.orchestrator
        .toggle_routing(
            &cancel,
            ingress(),
            &[
                RoutingTarget::new(inference_service("llama")),
                RoutingTarget::new(inference_service("mistral")),
            ],
        )
        .await
        .unwrap();
    f.orchestrator
        .toggle_routing(
            &cancel,
            ingress(),
            &[RoutingTarget::new(inference_service("llama"))],
        )
        .await
        .unwrap();

    let routing = f.orchestrator.routing();
    assert_eq!(
        routing.state(&inference_service("mistral")),
        Some(ControllerState::Inactive)
    );
    assert_eq!(routing.active_references(), vec![inference_service("llama")]);

    let mistral = f
        .routing
        .created()
        .into_iter()
        .find(|c| c.name.ends_with("mistral"))
        .unwrap();
    assert_eq!(mistral.deactivations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_schema_fails_only_its_target() {
    let f = fixture(&["kubeflow.org"]);
    let cancel = CancellationToken::new();

    let err = f
        .orchestrator
        .toggle_authorization(
            &cancel,
            provider("aud"),
            &[
                ProtectedResource::new(inference_service("llama")),
                ProtectedResource::new(notebook("jupyter")),
            ],
        )
        .await
        .unwrap_err();

    assert_eq!(err.len(), 1);
    assert!(matches!(
        &err.errors()[0],
        ActivationError::ReadinessTimeout { gvk, .. } if gvk == "kubeflow.org/v1, Kind=Notebook"
    ));
    assert_eq!(
        f.orchestrator.authorization().active_references(),
        vec![inference_service("llama")]
    );
}

#[tokio::test]
async fn capabilities_are_independent() {
    let f = fixture(&[]);
    let cancel = CancellationToken::new();
    let llama = inference_service("llama");
    let protected = vec![ProtectedResource::new(llama.clone())];
    let routed = vec![RoutingTarget::new(llama.clone())];

    let (authz, routing) = tokio::join!(
        f.orchestrator
            .toggle_authorization(&cancel, provider("aud"), &protected),
        f.orchestrator.toggle_routing(&cancel, ingress(), &routed),
    );
    authz.unwrap();
    routing.unwrap();

    // Clearing routing leaves authorization untouched
    f.orchestrator
        .toggle_routing(&cancel, ingress(), &[])
        .await
        .unwrap();

    assert_eq!(
        f.orchestrator.authorization().state(&llama),
        Some(ControllerState::Active)
    );
    assert_eq!(
        f.orchestrator.routing().state(&llama),
        Some(ControllerState::Inactive)
    );
    assert_eq!(
        f.runtime.registered(),
        vec!["authz-ctrl-models-llama", "routing-ctrl-models-llama"]
    );
}

#[test]
fn zero_poll_interval_is_rejected_at_construction() {
    let authz: Arc<RecordingFactory<ProviderConfig>> = RecordingFactory::new("authz");
    let routing: Arc<RecordingFactory<IngressConfig>> = RecordingFactory::new("routing");

    let result = PlatformOrchestrator::new(
        static_probe(&[]),
        Arc::new(ControllerRuntime::new()),
        authz,
        routing,
        ActivatorConfig {
            poll_interval: Duration::ZERO,
            readiness_timeout: Duration::from_secs(2),
        },
    );

    let err = result.err().unwrap();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.field(), Some("TRELLIS_READINESS_POLL_INTERVAL_MS"));
}

#[test]
fn capability_settings_deserialize_from_camel_case() {
    let config: ProviderConfig = serde_json::from_value(serde_json::json!({
        "label": "security.opendatahub.io/authorization-group=default",
        "providerName": "authorino"
    }))
    .unwrap();
    assert_eq!(config.provider_name, "authorino");
    assert!(config.audiences.is_empty());

    let target: ProtectedResource = serde_json::from_value(serde_json::json!({
        "resourceReference": {
            "group": "serving.kserve.io",
            "version": "v1beta1",
            "kind": "InferenceService",
            "name": "llama",
            "namespace": "models"
        },
        "hostPaths": ["/v1/models"]
    }))
    .unwrap();
    assert_eq!(target.resource_reference, inference_service("llama"));
    assert_eq!(target.host_paths, vec!["/v1/models"]);
}
