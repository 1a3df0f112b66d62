//! Per-request dispatch.
//!
//! The [`Agent`] ties the router to the three policies. Each intercepted
//! request is handled as one task that resolves to exactly one
//! [`FetchOutcome`].

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::entry::CachedResponse;
use crate::cache::store::{CacheError, SharedStore};
use crate::config::AgentConfig;
use crate::http::AgentRequest;
use crate::lifecycle::ClientControl;
use crate::metrics::Metrics;
use crate::network::SharedNetwork;
use crate::policy::{CacheFirst, NetworkFirstApi, NetworkFirstNavigation, Outcome, Policy};
use crate::router::{Category, Router};

#[derive(Error, Debug)]
pub enum AgentError {
    /// Quota exhaustion, unavailable storage and similar. Never masked.
    #[error("Cache store failure: {0}")]
    Cache(#[from] CacheError),
}

/// What the agent decided for one request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A policy produced the response.
    Respond {
        response: CachedResponse,
        category: Category,
        outcome: Outcome,
    },
    /// Not managed; the host should perform its default network handling.
    PassThrough,
}

pub struct Agent {
    router: Router,
    cache_first: CacheFirst,
    navigation: NetworkFirstNavigation,
    api: NetworkFirstApi,
    control: Arc<ClientControl>,
    metrics: Arc<Metrics>,
}

impl Agent {
    pub fn new(
        config: &AgentConfig,
        store: SharedStore,
        network: SharedNetwork,
        control: Arc<ClientControl>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            router: Router::from_config(config),
            cache_first: CacheFirst::new(store.clone(), network.clone(), &config.namespace),
            navigation: NetworkFirstNavigation::new(
                store,
                network.clone(),
                &config.namespace,
                &config.root_document,
            ),
            api: NetworkFirstApi::new(network),
            control,
            metrics,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Classify and handle one request.
    ///
    /// Until the agent has claimed its clients every request passes through.
    pub async fn handle_fetch(&self, request: &AgentRequest) -> Result<FetchOutcome, AgentError> {
        if !self.control.is_claimed() {
            self.metrics.record_pass_through();
            return Ok(FetchOutcome::PassThrough);
        }

        let category = self.router.classify(request);
        let policy: &dyn Policy = match category {
            Category::Static => &self.cache_first,
            Category::Navigation => &self.navigation,
            Category::Api => &self.api,
            Category::PassThrough => {
                self.metrics.record_pass_through();
                return Ok(FetchOutcome::PassThrough);
            }
        };

        let handled = policy.handle(request).await?;
        self.metrics.record(category, handled.outcome);
        debug!(
            url = %request.url,
            category = %category,
            outcome = %handled.outcome,
            status = handled.response.status,
            "Handled request"
        );

        Ok(FetchOutcome::Respond {
            response: handled.response,
            category,
            outcome: handled.outcome,
        })
    }

    /// Run one request as its own task.
    pub fn spawn_fetch(
        self: &Arc<Self>,
        request: AgentRequest,
    ) -> JoinHandle<Result<FetchOutcome, AgentError>> {
        let agent = Arc::clone(self);
        tokio::spawn(async move { agent.handle_fetch(&request).await })
    }
}
