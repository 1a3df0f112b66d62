//! The intercepting proxy.
//!
//! Every request that is not an admin route goes through the [`Agent`]. A
//! pass-through decision forwards the request to the origin unchanged, which
//! is what a browser would do without the agent installed.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH};
use axum::http::{request, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::{Agent, FetchOutcome};
use crate::cache::entry::CachedResponse;
use crate::cache::store::SharedStore;
use crate::config::Config;
use crate::http::AgentRequest;
use crate::lifecycle::LifecycleManager;
use crate::metrics::Metrics;
use crate::network::{is_hop_by_hop, FetchOptions, SharedNetwork};
use crate::server::admin;

/// Largest request body the proxy buffers.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across handlers.
pub struct AppState {
    pub agent: Arc<Agent>,
    pub lifecycle: Arc<LifecycleManager>,
    pub store: SharedStore,
    pub network: SharedNetwork,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router: admin routes plus the catch-all intercept handler.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/__agent/health", get(admin::health))
        .route("/__agent/cache", get(admin::cache_stats))
        .route("/__agent/metrics", get(admin::metrics))
        .fallback(intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn intercept(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
    };
    let agent_request = to_agent_request(&parts, body);

    let span = info_span!(
        "fetch",
        request_id = %request_id,
        method = %agent_request.method,
        url = %agent_request.url,
        navigate = agent_request.navigate
    );

    async move {
        match state.agent.handle_fetch(&agent_request).await {
            Ok(FetchOutcome::Respond { response, .. }) => into_http_response(response),
            Ok(FetchOutcome::PassThrough) => {
                match state.network.fetch(&agent_request, FetchOptions::default()).await {
                    Ok(response) => into_http_response(response),
                    Err(e) => {
                        warn!(error = %e, "Pass-through fetch failed");
                        (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Build an [`AgentRequest`] from an incoming HTTP request.
pub fn to_agent_request(parts: &request::Parts, body: Bytes) -> AgentRequest {
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut agent_request = AgentRequest::new(parts.method.as_str(), url).with_body(body);
    agent_request.navigate = is_navigation(parts);
    agent_request.headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Bytes::copy_from_slice(value.as_bytes()),
            )
        })
        .collect();
    agent_request
}

/// Navigation intent: `Sec-Fetch-Mode: navigate`, or for clients that do not
/// send fetch metadata, a GET that accepts HTML.
pub fn is_navigation(parts: &request::Parts) -> bool {
    if let Some(mode) = parts.headers.get("sec-fetch-mode") {
        return mode.as_bytes().eq_ignore_ascii_case(b"navigate");
    }
    parts.method == Method::GET
        && parts
            .headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
}

/// Turn a captured or synthetic response back into an HTTP response.
pub fn into_http_response(captured: CachedResponse) -> Response {
    let mut response = Response::new(Body::from(captured.body));
    *response.status_mut() =
        StatusCode::from_u16(captured.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (name, value) in &captured.headers {
        // The body is re-framed by hyper; its own length wins.
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping unrepresentable header"),
        }
    }
    response
}
