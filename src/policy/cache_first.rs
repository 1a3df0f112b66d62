//! Cache-first strategy for static assets.
//!
//! Static assets only change on redeploy, and a redeploy bumps the namespace,
//! so anything found in the current namespace is served as is.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent::AgentError;
use crate::cache::store::SharedStore;
use crate::http::AgentRequest;
use crate::network::{FetchOptions, SharedNetwork};
use crate::policy::{synthetic, Handled, Outcome, Policy};

pub struct CacheFirst {
    store: SharedStore,
    network: SharedNetwork,
    namespace: String,
}

impl CacheFirst {
    pub fn new(store: SharedStore, network: SharedNetwork, namespace: impl Into<String>) -> Self {
        Self {
            store,
            network,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Policy for CacheFirst {
    async fn handle(&self, request: &AgentRequest) -> Result<Handled, AgentError> {
        let key = request.key();
        let handle = self.store.open(&self.namespace).await?;

        if let Some(cached) = self.store.get(&handle, &key).await? {
            debug!(key = %key, "Cache hit");
            return Ok(Handled::new(cached, Outcome::CacheHit));
        }

        let response = match self.network.fetch(request, FetchOptions::default()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %key, error = %e, "Static asset unavailable offline");
                return Ok(Handled::new(synthetic::offline_text(), Outcome::OfflineSynthetic));
            }
        };

        // Only successful GETs are captured; anything else would pin an error
        // or an unrepeatable request until the next namespace bump.
        if request.method != "GET" || !response.is_success() {
            debug!(key = %key, status = response.status, "Not caching");
            return Ok(Handled::new(response, Outcome::Network));
        }

        // The put finishes before the response is handed back, so it is part
        // of this request's lifetime and never detached.
        self.store.put(&handle, key, response.clone()).await?;
        Ok(Handled::new(response, Outcome::CacheMissStored))
    }
}
