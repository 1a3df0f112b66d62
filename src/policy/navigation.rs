//! Network-first strategy for top-level page loads.

use async_trait::async_trait;
use tracing::warn;

use crate::agent::AgentError;
use crate::cache::entry::RequestKey;
use crate::cache::store::SharedStore;
use crate::http::AgentRequest;
use crate::network::{FetchOptions, SharedNetwork};
use crate::policy::{synthetic, Handled, Outcome, Policy};

/// Always fetches fresh, bypassing HTTP caches. The cached root document is
/// only consulted after that fetch has failed.
pub struct NetworkFirstNavigation {
    store: SharedStore,
    network: SharedNetwork,
    namespace: String,
    root_document: RequestKey,
}

impl NetworkFirstNavigation {
    pub fn new(
        store: SharedStore,
        network: SharedNetwork,
        namespace: impl Into<String>,
        root_document: &str,
    ) -> Self {
        Self {
            store,
            network,
            namespace: namespace.into(),
            root_document: RequestKey::get(root_document),
        }
    }
}

#[async_trait]
impl Policy for NetworkFirstNavigation {
    async fn handle(&self, request: &AgentRequest) -> Result<Handled, AgentError> {
        let err = match self.network.fetch(request, FetchOptions::no_store()).await {
            Ok(response) => return Ok(Handled::new(response, Outcome::Network)),
            Err(e) => e,
        };

        let handle = self.store.open(&self.namespace).await?;
        match self.store.get(&handle, &self.root_document).await? {
            Some(cached) => {
                warn!(url = %request.url, error = %err, "Offline, serving cached root document");
                Ok(Handled::new(cached, Outcome::OfflineCached))
            }
            None => {
                warn!(url = %request.url, error = %err, "Offline and no cached root document");
                Ok(Handled::new(synthetic::offline_text(), Outcome::OfflineSynthetic))
            }
        }
    }
}
