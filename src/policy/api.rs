//! Network-first strategy for API calls.
//!
//! There is deliberately no cache fallback: a stale API answer is worse than
//! an explicit offline marker.

use async_trait::async_trait;
use tracing::warn;

use crate::agent::AgentError;
use crate::http::AgentRequest;
use crate::network::{FetchOptions, SharedNetwork};
use crate::policy::{synthetic, Handled, Outcome, Policy};

pub struct NetworkFirstApi {
    network: SharedNetwork,
}

impl NetworkFirstApi {
    pub fn new(network: SharedNetwork) -> Self {
        Self { network }
    }
}

#[async_trait]
impl Policy for NetworkFirstApi {
    async fn handle(&self, request: &AgentRequest) -> Result<Handled, AgentError> {
        match self.network.fetch(request, FetchOptions::default()).await {
            // HTTP error statuses are passed through untouched.
            Ok(response) => Ok(Handled::new(response, Outcome::Network)),
            Err(e) => {
                warn!(method = %request.method, url = %request.url, error = %e, "API offline");
                Ok(Handled::new(synthetic::offline_json(), Outcome::OfflineSynthetic))
            }
        }
    }
}
