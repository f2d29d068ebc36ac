//! Capability activator
//!
//! Converges the set of running controllers for one capability onto a
//! desired list of targets. A reconcile call runs in two phases:
//!
//! 1. **Stale deactivation** - controllers whose target is no longer desired
//!    are deactivated. Their entries are kept so a later call can bring them
//!    back without re-registering.
//! 2. **Activation** - every desired target is handled concurrently. Known
//!    targets get the new configuration applied in place; unknown targets wait
//!    for their schema to be served, then get a controller created and
//!    registered.
//!
//! Failures are per target. Every target is attempted, and the failures are
//! returned together once all of them have finished.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use trellis_common::poll::{poll_until_ready, PollError};
use trellis_common::{Error, HasResourceReference, ResourceReference};

use crate::config::ActivatorConfig;
use crate::controller::{ActivableController, ControllerRuntime, ControllerState};
use crate::error::{ActivationError, AggregateError};
use crate::probe::ReadinessProbe;

struct ControllerEntry<C> {
    controller: Arc<dyn ActivableController<C>>,
    state: ControllerState,
}

/// Lifecycle engine for the controllers of one capability.
///
/// `C` is the capability configuration, `T` the target type. Each target's
/// [`ResourceReference`] maps to at most one controller. Entries are never
/// removed; targets that drop out of the desired set are only marked
/// inactive, which keeps memory bounded by the number of distinct resources
/// ever targeted.
pub struct CapabilityActivator<C, T> {
    capability: String,
    probe: Arc<dyn ReadinessProbe>,
    runtime: Arc<ControllerRuntime>,
    config: ActivatorConfig,
    controllers: DashMap<ResourceReference, ControllerEntry<C>>,
    reconcile_lock: Mutex<()>,
    _target: PhantomData<fn(&T)>,
}

impl<C, T> CapabilityActivator<C, T>
where
    C: Send + Sync + 'static,
    T: HasResourceReference + Sync,
{
    /// Create an activator with the default readiness policy
    pub fn new(
        capability: impl Into<String>,
        probe: Arc<dyn ReadinessProbe>,
        runtime: Arc<ControllerRuntime>,
    ) -> Self {
        Self {
            capability: capability.into(),
            probe,
            runtime,
            config: ActivatorConfig::default(),
            controllers: DashMap::new(),
            reconcile_lock: Mutex::new(()),
            _target: PhantomData,
        }
    }

    /// Override the readiness policy.
    ///
    /// Fails if the policy would poll in a tight loop or never poll before
    /// the deadline.
    pub fn with_config(mut self, config: ActivatorConfig) -> Result<Self, Error> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Capability label used in logs
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Converge controllers onto `targets`.
    ///
    /// `create` builds a controller for a target seen for the first time;
    /// `update` re-applies `config` to an existing one. Duplicate references
    /// in `targets` are handled once. Concurrent calls on the same activator
    /// run one after another.
    ///
    /// # Returns
    /// `Ok(())` if every target was activated or updated, otherwise every
    /// per-target failure. Targets that succeeded stay active either way.
    #[instrument(skip_all, fields(capability = %self.capability, targets = targets.len()))]
    pub async fn reconcile<F, U>(
        &self,
        cancel: &CancellationToken,
        targets: &[T],
        config: &C,
        create: F,
        update: U,
    ) -> Result<(), AggregateError>
    where
        F: Fn(&T, &C) -> Arc<dyn ActivableController<C>> + Sync,
        U: Fn(&dyn ActivableController<C>, &C) + Sync,
    {
        let _serialized = self.reconcile_lock.lock().await;

        self.deactivate_stale(targets);

        let outcomes = join_all(
            distinct_targets(targets)
                .into_iter()
                .map(|target| self.activate_or_create(cancel, target, config, &create, &update)),
        )
        .await;

        let errors: Vec<ActivationError> = outcomes.into_iter().filter_map(Result::err).collect();
        if !errors.is_empty() {
            warn!(failed = errors.len(), "some targets could not be activated");
        }
        AggregateError::check(errors)
    }

    /// Deactivate active controllers whose reference is not among `targets`
    fn deactivate_stale(&self, targets: &[T]) {
        let desired: HashSet<&ResourceReference> =
            targets.iter().map(|t| t.resource_reference()).collect();

        let mut stale = Vec::new();
        for mut entry in self.controllers.iter_mut() {
            if entry.state == ControllerState::Active && !desired.contains(entry.key()) {
                entry.state = ControllerState::Inactive;
                stale.push((entry.key().clone(), entry.controller.clone()));
            }
        }

        for (reference, controller) in stale {
            info!(
                resource = %reference,
                controller = %controller.name(),
                "deactivating controller for target no longer desired"
            );
            controller.deactivate();
        }
    }

    async fn activate_or_create<F, U>(
        &self,
        cancel: &CancellationToken,
        target: &T,
        config: &C,
        create: &F,
        update: &U,
    ) -> Result<(), ActivationError>
    where
        F: Fn(&T, &C) -> Arc<dyn ActivableController<C>> + Sync,
        U: Fn(&dyn ActivableController<C>, &C) + Sync,
    {
        let reference = target.resource_reference();

        let existing = self.controllers.get_mut(reference).map(|mut entry| {
            entry.state = ControllerState::Active;
            entry.controller.clone()
        });

        if let Some(controller) = existing {
            debug!(
                resource = %reference,
                controller = %controller.name(),
                "applying configuration to existing controller"
            );
            update(controller.as_ref(), config);
            return Ok(());
        }

        self.wait_for_schema(cancel, reference).await?;

        let controller = create(target, config);
        let name = controller.name();

        // A name already held by the runtime belongs to someone else and must
        // survive a failed registration here.
        let name_was_free = !self.runtime.is_registered(&name);
        let registration = controller.register(&self.runtime, cancel).await;

        if registration.is_err() || cancel.is_cancelled() {
            if name_was_free && self.runtime.abort(&name) {
                debug!(resource = %reference, controller = %name, "released partial registration");
            }
            if cancel.is_cancelled() {
                return Err(ActivationError::Cancelled { gvk: reference.gvk_string() });
            }
        }

        if let Err(source) = registration {
            warn!(resource = %reference, controller = %name, error = %source, "failed to setup controller");
            return Err(ActivationError::Setup {
                controller: name,
                source,
            });
        }

        self.controllers.insert(
            reference.clone(),
            ControllerEntry {
                controller,
                state: ControllerState::Active,
            },
        );
        info!(resource = %reference, controller = %name, "controller created and registered");
        Ok(())
    }

    /// Block until the target's schema is served, bounded by the readiness policy
    async fn wait_for_schema(
        &self,
        cancel: &CancellationToken,
        reference: &ResourceReference,
    ) -> Result<(), ActivationError> {
        let group_version = reference.group_version();
        let probe = self.probe.as_ref();
        let gv = &group_version;

        let result = poll_until_ready(
            cancel,
            self.config.poll_interval,
            self.config.readiness_timeout,
            move || probe.is_ready(gv),
        )
        .await;

        let gvk = reference.gvk_string();
        match result {
            Ok(()) => Ok(()),
            Err(PollError::Timeout(timeout)) => {
                warn!(resource = %reference, ?timeout, "schema did not become available");
                Err(ActivationError::ReadinessTimeout { gvk, timeout })
            }
            Err(PollError::Cancelled) => Err(ActivationError::Cancelled { gvk }),
            Err(PollError::Check(source)) => {
                warn!(resource = %reference, error = %source, "readiness probe failed");
                Err(ActivationError::Probe { gvk, source })
            }
        }
    }

    /// Lifecycle state of the controller for `reference`, if one was ever created
    pub fn state(&self, reference: &ResourceReference) -> Option<ControllerState> {
        self.controllers.get(reference).map(|e| e.state)
    }

    /// Controller held for `reference`
    pub fn controller(&self, reference: &ResourceReference) -> Option<Arc<dyn ActivableController<C>>> {
        self.controllers.get(reference).map(|e| e.controller.clone())
    }

    /// References with an active controller, sorted
    pub fn active_references(&self) -> Vec<ResourceReference> {
        let mut refs: Vec<ResourceReference> = self
            .controllers
            .iter()
            .filter(|e| e.state == ControllerState::Active)
            .map(|e| e.key().clone())
            .collect();
        refs.sort();
        refs
    }

    /// Number of controllers held, active or not
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Whether no controller was ever created
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// First occurrence of each reference, in input order
fn distinct_targets<T: HasResourceReference>(targets: &[T]) -> Vec<&T> {
    let mut seen = HashSet::new();
    let mut distinct = Vec::with_capacity(targets.len());
    for target in targets {
        let reference = target.resource_reference();
        if seen.insert(reference) {
            distinct.push(target);
        } else {
            warn!(resource = %reference, "duplicate target ignored");
        }
    }
    distinct
}
