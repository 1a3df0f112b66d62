//! Per-category fetch strategies.
//!
//! - [`cache_first`]: Static assets, cache then network
//! - [`navigation`]: Page loads, network then cached root document
//! - [`api`]: API calls, network then JSON offline marker
//! - [`synthetic`]: The two locally built 503 responses
//!
//! A policy always resolves to a response, even with the network gone. The
//! only error it surfaces is a cache store failure.

pub mod api;
pub mod cache_first;
pub mod navigation;
pub mod synthetic;

use async_trait::async_trait;
use serde::Serialize;

use crate::agent::AgentError;
use crate::cache::entry::CachedResponse;
use crate::http::AgentRequest;

pub use api::NetworkFirstApi;
pub use cache_first::CacheFirst;
pub use navigation::NetworkFirstNavigation;

/// Where a policy's response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Straight from the network.
    Network,
    /// Served from the cache without touching the network.
    CacheHit,
    /// Cache miss, fetched and stored.
    CacheMissStored,
    /// Network failed, served a cached fallback.
    OfflineCached,
    /// Network failed, served a synthetic 503.
    OfflineSynthetic,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Network => "network",
            Outcome::CacheHit => "cache_hit",
            Outcome::CacheMissStored => "cache_miss_stored",
            Outcome::OfflineCached => "offline_cached",
            Outcome::OfflineSynthetic => "offline_synthetic",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved policy result.
#[derive(Debug, Clone)]
pub struct Handled {
    pub response: CachedResponse,
    pub outcome: Outcome,
}

impl Handled {
    pub fn new(response: CachedResponse, outcome: Outcome) -> Self {
        Self { response, outcome }
    }
}

#[async_trait]
pub trait Policy: Send + Sync {
    async fn handle(&self, request: &AgentRequest) -> Result<Handled, AgentError>;
}
