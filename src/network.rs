//! Network access to the upstream origin.
//!
//! A fetch either yields a response (any status, 2xx or not) or fails with a
//! [`NetworkError`]. Only the latter triggers the policies' offline fallbacks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::cache::entry::CachedResponse;
use crate::config::UpstreamConfig;
use crate::http::AgentRequest;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Per-fetch options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Ask every HTTP-level cache between us and the origin to stay out of it.
    pub bypass_http_cache: bool,
}

impl FetchOptions {
    pub fn no_store() -> Self {
        Self {
            bypass_http_cache: true,
        }
    }
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(
        &self,
        request: &AgentRequest,
        options: FetchOptions,
    ) -> Result<CachedResponse, NetworkError>;
}

pub type SharedNetwork = Arc<dyn Network>;

/// Headers that describe a single connection and must not be forwarded or
/// captured.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// [`Network`] implementation that talks HTTP to a fixed origin.
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: String,
    timeout: Option<Duration>,
}

impl HttpNetwork {
    pub fn new(config: &UpstreamConfig) -> Result<Self, NetworkError> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));

        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            origin: config.origin.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn map_error(&self, err: reqwest::Error) -> NetworkError {
        match self.timeout {
            _ if err.is_builder() => NetworkError::InvalidRequest(err.to_string()),
            Some(t) if err.is_timeout() => NetworkError::Timeout(t),
            _ => NetworkError::Unreachable(err.to_string()),
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(
        &self,
        request: &AgentRequest,
        options: FetchOptions,
    ) -> Result<CachedResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::InvalidRequest(format!("bad method {}", request.method)))?;
        let url = format!("{}{}", self.origin, request.url);

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            if is_hop_by_hop(name) || name.eq_ignore_ascii_case("host") {
                continue;
            }
            if options.bypass_http_cache
                && (name.eq_ignore_ascii_case("cache-control") || name.eq_ignore_ascii_case("pragma"))
            {
                continue;
            }
            builder = builder.header(name.as_str(), &value[..]);
        }
        if options.bypass_http_cache {
            builder = builder
                .header("Cache-Control", "no-store")
                .header("Pragma", "no-cache");
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let resp = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = resp.status().as_u16();
        let headers: Vec<(String, Bytes)> = resp
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    Bytes::copy_from_slice(value.as_bytes()),
                )
            })
            .collect();
        let body = resp.bytes().await.map_err(|e| self.map_error(e))?;

        debug!(url = %url, status, bytes = body.len(), "Upstream fetch complete");

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
