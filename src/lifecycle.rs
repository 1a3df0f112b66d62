//! Install/activate lifecycle of the agent.
//!
//! ```text
//! Uninstalled → Installing → Installed (waiting) → Activating → Active
//!                    └──────→ Redundant (install failed)
//! ```
//!
//! Transitions are driven by the host's install and activate signals, never
//! by request traffic. Install is all-or-nothing: every bootstrap URL is
//! fetched before anything is written, a failed write restores the namespace
//! to its previous contents, and a retry re-fetches the whole set. A namespace
//! left complete by an earlier run can be resumed without the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cache::entry::{CachedResponse, RequestKey};
use crate::cache::store::{CacheError, NamespaceHandle, SharedStore};
use crate::config::AgentConfig;
use crate::http::AgentRequest;
use crate::network::{FetchOptions, NetworkError, SharedNetwork};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    /// Installed and waiting to be activated.
    Installed,
    Activating,
    Active,
    /// Install failed; the previous version keeps serving.
    Redundant,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Uninstalled => "uninstalled",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Bootstrap fetch of {url} failed: {source}")]
    BootstrapFetch {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("Bootstrap fetch of {url} returned HTTP {status}")]
    BootstrapStatus { url: String, status: u16 },

    #[error("Cache store failure: {0}")]
    Cache(#[from] CacheError),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: LifecycleState,
        action: &'static str,
    },
}

/// Controls the host exposes to the agent.
pub trait HostControls: Send + Sync {
    /// Take over immediately instead of waiting for old pages to close.
    fn skip_waiting(&self);

    /// Start serving every open page without a reload.
    fn claim_clients(&self);
}

/// [`HostControls`] backed by two flags the proxy consults.
#[derive(Debug, Default)]
pub struct ClientControl {
    waiting_skipped: AtomicBool,
    claimed: AtomicBool,
}

impl ClientControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waiting_skipped(&self) -> bool {
        self.waiting_skipped.load(Ordering::Acquire)
    }

    /// Whether intercepted traffic should go through the policies.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

impl HostControls for ClientControl {
    fn skip_waiting(&self) {
        self.waiting_skipped.store(true, Ordering::Release);
    }

    fn claim_clients(&self) {
        self.claimed.store(true, Ordering::Release);
    }
}

/// Result of an activate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    /// Stale namespaces removed.
    pub deleted: Vec<String>,
    /// Stale namespaces whose deletion failed; retried on the next activate.
    pub failed: Vec<String>,
}

pub struct LifecycleManager {
    config: AgentConfig,
    store: SharedStore,
    network: SharedNetwork,
    host: Arc<dyn HostControls>,
    state: RwLock<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        config: AgentConfig,
        store: SharedStore,
        network: SharedNetwork,
        host: Arc<dyn HostControls>,
    ) -> Self {
        Self {
            config,
            store,
            network,
            host,
            state: RwLock::new(LifecycleState::Uninstalled),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Populate the current namespace with the bootstrap set.
    ///
    /// On failure the state becomes `Redundant` and the namespace is left as
    /// it was before the attempt.
    pub async fn install(&self) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.write().await;
            if !matches!(*state, LifecycleState::Uninstalled | LifecycleState::Redundant) {
                return Err(LifecycleError::InvalidTransition {
                    state: *state,
                    action: "install",
                });
            }
            *state = LifecycleState::Installing;
        }

        info!(
            namespace = %self.config.namespace,
            assets = self.config.bootstrap.len(),
            "Installing"
        );

        match self.populate_bootstrap().await {
            Ok(()) => {
                *self.state.write().await = LifecycleState::Installed;
                self.host.skip_waiting();
                info!(namespace = %self.config.namespace, "Installed");
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = LifecycleState::Redundant;
                error!(namespace = %self.config.namespace, error = %e, "Install failed");
                Err(e)
            }
        }
    }

    async fn populate_bootstrap(&self) -> Result<(), LifecycleError> {
        let fetches = self.config.bootstrap.iter().map(|url| self.fetch_bootstrap(url));
        let responses = futures::future::try_join_all(fetches).await?;

        let existed = self.store.has_namespace(&self.config.namespace).await?;
        let handle = self.store.open(&self.config.namespace).await?;

        // Snapshot what a reinstall is about to overwrite so a failed write can
        // put the namespace back exactly as it was.
        let mut previous = Vec::with_capacity(self.config.bootstrap.len());
        if existed {
            for url in &self.config.bootstrap {
                previous.push(self.store.get(&handle, &RequestKey::get(url)).await?);
            }
        }

        for (written, (url, response)) in self.config.bootstrap.iter().zip(responses).enumerate() {
            if let Err(e) = self.store.put(&handle, RequestKey::get(url), response).await {
                self.roll_back(&handle, existed, &previous[..written.min(previous.len())])
                    .await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Undo the first `previous.len()` bootstrap writes of a failed install.
    ///
    /// A namespace this install created is dropped. An existing one gets its
    /// old entries back; if that fails too it is dropped, since a mix of old
    /// and new bootstrap entries must never be served as complete.
    async fn roll_back(
        &self,
        handle: &NamespaceHandle,
        existed: bool,
        previous: &[Option<CachedResponse>],
    ) {
        if existed {
            let mut restored = true;
            for (url, old) in self.config.bootstrap.iter().zip(previous) {
                let key = RequestKey::get(url);
                let result = match old {
                    Some(old) => self.store.put(handle, key, old.clone()).await,
                    None => self.store.remove(handle, &key).await.map(|_| ()),
                };
                if let Err(e) = result {
                    warn!(url = %url, error = %e, "Could not restore bootstrap entry");
                    restored = false;
                    break;
                }
            }
            if restored {
                debug!(namespace = %handle, "Restored previous bootstrap entries");
                return;
            }
        }

        match self.store.delete_namespace(handle.name()).await {
            Ok(_) => warn!(namespace = %handle, "Dropped partially installed namespace"),
            Err(e) => warn!(
                namespace = %handle,
                error = %e,
                "Could not remove partially installed namespace"
            ),
        }
    }

    /// Whether the current namespace already holds every bootstrap entry.
    pub async fn bootstrap_complete(&self) -> Result<bool, LifecycleError> {
        if !self.store.has_namespace(&self.config.namespace).await? {
            return Ok(false);
        }
        let handle = self.store.open(&self.config.namespace).await?;
        for url in &self.config.bootstrap {
            if self.store.get(&handle, &RequestKey::get(url)).await?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Move to `Installed` from a namespace a previous run already populated.
    ///
    /// Returns `false` when the store does not hold a complete bootstrap set.
    pub async fn resume(&self) -> Result<bool, LifecycleError> {
        {
            let state = self.state.read().await;
            if !matches!(*state, LifecycleState::Uninstalled | LifecycleState::Redundant) {
                return Err(LifecycleError::InvalidTransition {
                    state: *state,
                    action: "resume",
                });
            }
        }
        if !self.bootstrap_complete().await? {
            return Ok(false);
        }

        *self.state.write().await = LifecycleState::Installed;
        self.host.skip_waiting();
        info!(namespace = %self.config.namespace, "Resumed from existing namespace");
        Ok(true)
    }

    async fn fetch_bootstrap(&self, url: &str) -> Result<CachedResponse, LifecycleError> {
        let response = self
            .network
            .fetch(&AgentRequest::get(url), FetchOptions::no_store())
            .await
            .map_err(|source| LifecycleError::BootstrapFetch {
                url: url.to_string(),
                source,
            })?;

        if !response.is_success() {
            return Err(LifecycleError::BootstrapStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        debug!(url, bytes = response.body.len(), "Fetched bootstrap asset");
        Ok(response)
    }

    /// Drop every namespace other than the current one, then claim clients.
    pub async fn activate(&self) -> Result<ActivationReport, LifecycleError> {
        {
            let mut state = self.state.write().await;
            if *state != LifecycleState::Installed {
                return Err(LifecycleError::InvalidTransition {
                    state: *state,
                    action: "activate",
                });
            }
            *state = LifecycleState::Activating;
        }

        let namespaces = match self.store.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                *self.state.write().await = LifecycleState::Installed;
                return Err(e.into());
            }
        };

        let mut report = ActivationReport::default();
        for name in namespaces {
            // Exact match only: `app-static-v5` must not protect `app-static-v50`.
            if name == self.config.namespace {
                continue;
            }
            match self.store.delete_namespace(&name).await {
                Ok(_) => {
                    info!(namespace = %name, "Deleted stale namespace");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(namespace = %name, error = %e, "Stale namespace deletion failed");
                    report.failed.push(name);
                }
            }
        }

        *self.state.write().await = LifecycleState::Active;
        self.host.claim_clients();
        info!(
            namespace = %self.config.namespace,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Activated"
        );
        Ok(report)
    }

    /// Install, then activate straight away (the agent always skips waiting).
    ///
    /// When the install fails but a previous run left the current namespace
    /// complete, that generation is activated instead: the version already on
    /// disk keeps serving.
    pub async fn start(&self) -> Result<ActivationReport, LifecycleError> {
        if self.state().await != LifecycleState::Installed {
            if let Err(e) = self.install().await {
                if !self.resume().await? {
                    return Err(e);
                }
                warn!(error = %e, "Install failed, keeping the cached generation");
            }
        }
        self.activate().await
    }

    /// Call [`start`](Self::start) until the agent is active, doubling the
    /// delay between attempts from `initial` up to `max`.
    pub async fn start_with_retry(&self, initial: Duration, max: Duration) -> ActivationReport {
        let mut delay = initial;
        loop {
            if self.state().await == LifecycleState::Active {
                return ActivationReport::default();
            }
            match self.start().await {
                Ok(report) => return report,
                Err(e) => {
                    warn!(error = %e, retry_in = ?delay, "Agent start failed");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max);
                }
            }
        }
    }
}
