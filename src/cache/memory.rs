//! In-memory cache store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::entry::{CacheEntry, CachedResponse, RequestKey};
use crate::cache::store::{CacheError, CacheStore, NamespaceHandle};

/// A [`CacheStore`] backed by nested hash maps. Lost on restart.
#[derive(Default)]
pub struct MemoryCacheStore {
    namespaces: RwLock<HashMap<String, HashMap<RequestKey, CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, namespace: &str) -> Result<NamespaceHandle, CacheError> {
        self.namespaces
            .write()
            .await
            .entry(namespace.to_string())
            .or_default();
        Ok(NamespaceHandle::new(namespace))
    }

    async fn get(
        &self,
        handle: &NamespaceHandle,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(handle.name())
            .and_then(|entries| entries.get(key))
            .map(|entry| entry.response.clone()))
    }

    async fn put(
        &self,
        handle: &NamespaceHandle,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        let mut namespaces = self.namespaces.write().await;
        // The namespace may have been deleted by an activate since it was opened.
        let entries = namespaces
            .get_mut(handle.name())
            .ok_or_else(|| CacheError::UnknownNamespace(handle.name().to_string()))?;
        debug!(namespace = %handle, key = %key, "Stored entry");
        entries.insert(key.clone(), CacheEntry::new(key, response));
        Ok(())
    }

    async fn remove(&self, handle: &NamespaceHandle, key: &RequestKey) -> Result<bool, CacheError> {
        Ok(self
            .namespaces
            .write()
            .await
            .get_mut(handle.name())
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, CacheError> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, CacheError> {
        Ok(self.namespaces.write().await.remove(namespace).is_some())
    }

    async fn entry_count(&self, namespace: &str) -> Result<usize, CacheError> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(namespace)
            .map(HashMap::len)
            .unwrap_or(0))
    }
}
