//! The cache store contract.
//!
//! A store holds any number of namespaces, each mapping [`RequestKey`] to a
//! [`CachedResponse`]. Only whole namespaces are ever deleted; there is no
//! per-entry eviction.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::entry::{CachedResponse, RequestKey};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt cache entry at {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Namespace not open: {0}")]
    UnknownNamespace(String),
}

/// A handle to an opened namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceHandle {
    name: Arc<str>,
}

impl NamespaceHandle {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for NamespaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Versioned key-value store for captured responses.
///
/// `put` is an upsert and atomic per key. `get` never touches the network.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open (creating if absent) a namespace.
    async fn open(&self, namespace: &str) -> Result<NamespaceHandle, CacheError>;

    async fn get(
        &self,
        handle: &NamespaceHandle,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError>;

    async fn put(
        &self,
        handle: &NamespaceHandle,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError>;

    /// Remove one entry. Only used to roll back a failed install; returns
    /// whether the entry existed.
    async fn remove(&self, handle: &NamespaceHandle, key: &RequestKey) -> Result<bool, CacheError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a namespace and every entry in it. Returns whether it existed.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError>;

    async fn has_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        Ok(self
            .list_namespaces()
            .await?
            .iter()
            .any(|n| n == namespace))
    }

    /// Number of entries in a namespace (0 when absent).
    async fn entry_count(&self, namespace: &str) -> Result<usize, CacheError>;
}

/// Store shared between the lifecycle manager, the policies and the server.
pub type SharedStore = Arc<dyn CacheStore>;
