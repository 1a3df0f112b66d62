//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use offline_agent::agent::Agent;
use offline_agent::cache::memory::MemoryCacheStore;
use offline_agent::cache::{CacheError, CacheStore, CachedResponse, NamespaceHandle, RequestKey};
use offline_agent::config::AgentConfig;
use offline_agent::http::AgentRequest;
use offline_agent::lifecycle::{ClientControl, HostControls};
use offline_agent::metrics::Metrics;
use offline_agent::network::{FetchOptions, Network, NetworkError};

/// A network whose responses are scripted per URL. Unknown URLs get a 404.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, CachedResponse>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<(String, FetchOptions)>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, response: CachedResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn ok(&self, url: &str, body: &str) {
        self.route(url, CachedResponse::new(200).with_body(body.to_string()));
    }

    /// Make a single URL throw.
    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, FetchOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(
        &self,
        request: &AgentRequest,
        options: FetchOptions,
    ) -> Result<CachedResponse, NetworkError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.url.clone(), options));

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&request.url)
        {
            return Err(NetworkError::Unreachable("connection refused".to_string()));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| CachedResponse::new(404).with_body("not found")))
    }
}

/// Memory store that can be told to fail writes or deletions.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryCacheStore,
    fail_puts: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
    undeletable: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Fail writes of a single URL only.
    pub fn fail_put_of(&self, url: &str) {
        self.failing_keys.lock().unwrap().insert(url.to_string());
    }

    pub fn protect(&self, namespace: &str) {
        self.undeletable.lock().unwrap().insert(namespace.to_string());
    }
}

fn quota_exceeded() -> CacheError {
    CacheError::IoError(std::io::Error::other("quota exceeded"))
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn open(&self, namespace: &str) -> Result<NamespaceHandle, CacheError> {
        self.inner.open(namespace).await
    }

    async fn get(
        &self,
        handle: &NamespaceHandle,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        self.inner.get(handle, key).await
    }

    async fn put(
        &self,
        handle: &NamespaceHandle,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        if self.fail_puts.load(Ordering::SeqCst) || self.failing_keys.lock().unwrap().contains(&key.url)
        {
            return Err(quota_exceeded());
        }
        self.inner.put(handle, key, response).await
    }

    async fn remove(&self, handle: &NamespaceHandle, key: &RequestKey) -> Result<bool, CacheError> {
        self.inner.remove(handle, key).await
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, CacheError> {
        self.inner.list_namespaces().await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        if self.undeletable.lock().unwrap().contains(namespace) {
            return Err(quota_exceeded());
        }
        self.inner.delete_namespace(namespace).await
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize, CacheError> {
        self.inner.entry_count(namespace).await
    }
}

pub fn agent_config(namespace: &str, bootstrap: &[&str]) -> AgentConfig {
    AgentConfig {
        namespace: namespace.to_string(),
        bootstrap: bootstrap.iter().map(|s| s.to_string()).collect(),
        ..AgentConfig::default()
    }
}

/// An agent that has already claimed its clients.
pub fn claimed_agent(
    config: &AgentConfig,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
) -> (Agent, Arc<Metrics>) {
    let control = Arc::new(ClientControl::new());
    control.claim_clients();
    let metrics = Arc::new(Metrics::new().unwrap());
    (
        Agent::new(config, store, network, control, metrics.clone()),
        metrics,
    )
}
