//! Controller abstraction and runtime
//!
//! A capability controller is created once per target resource, registered
//! with the [`ControllerRuntime`] (which runs its watch loop), and then
//! toggled between active and inactive as the desired target set changes.

use std::future::Future;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use trellis_common::Error;

/// A per-target controller that can be switched on and off at runtime.
///
/// `C` is the capability configuration applied on activation.
#[async_trait]
pub trait ActivableController<C>: Send + Sync {
    /// Unique name used for registration and error reporting
    fn name(&self) -> String;

    /// Start (or keep) reconciling with the given configuration
    fn activate(&self, config: C);

    /// Stop acting on the target; the controller stays registered
    fn deactivate(&self);

    /// Register the controller's watch loop with the runtime.
    ///
    /// Implementations should return promptly once `cancel` fires. Anything
    /// spawned under [`name`](Self::name) before a failed or cancelled
    /// registration is aborted by the caller.
    async fn register(
        &self,
        runtime: &ControllerRuntime,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;
}

/// Lifecycle state of a controller held by an activator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Registered and applying the capability
    Active,
    /// Registered but no longer desired
    Inactive,
}

/// Registry of running controller tasks.
///
/// Controllers spawn their watch loops here during registration. Every task
/// stops when the runtime shuts down.
pub struct ControllerRuntime {
    shutdown: CancellationToken,
    tasks: DashMap<String, JoinHandle<()>>,
}

impl Default for ControllerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            tasks: DashMap::new(),
        }
    }

    /// Token cancelled when the runtime shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Run a controller loop under `name`.
    ///
    /// Names are unique for the lifetime of the runtime; registering a name
    /// twice, or after shutdown, fails.
    pub fn spawn<F>(&self, name: impl Into<String>, fut: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        if self.shutdown.is_cancelled() {
            return Err(Error::registration(name, "controller runtime is shut down"));
        }

        match self.tasks.entry(name) {
            Entry::Occupied(entry) => Err(Error::registration(
                entry.key().clone(),
                "a controller with this name is already registered",
            )),
            Entry::Vacant(entry) => {
                let shutdown = self.shutdown.clone();
                let task_name = entry.key().clone();
                let handle = tokio::spawn(async move {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            debug!(controller = %task_name, "controller stopped by shutdown");
                        }
                        _ = fut => {
                            warn!(controller = %task_name, "controller loop exited");
                        }
                    }
                });
                info!(controller = %entry.key(), "controller registered");
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Stop the loop registered under `name` and release the name.
    ///
    /// Returns whether a loop was registered.
    pub fn abort(&self, name: &str) -> bool {
        match self.tasks.remove(name) {
            Some((name, handle)) => {
                handle.abort();
                info!(controller = %name, "controller aborted");
                true
            }
            None => false,
        }
    }

    /// Whether a controller with this name has been registered
    pub fn is_registered(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Names of all registered controllers, sorted
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Cancel every controller loop and wait for them to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let names: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((name, handle)) = self.tasks.remove(&name) {
                if let Err(e) = handle.await {
                    warn!(controller = %name, error = %e, "controller task failed");
                }
            }
        }
        info!("controller runtime shut down");
    }
}
