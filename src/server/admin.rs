//! Agent introspection endpoints.
//!
//! - GET /__agent/health
//! - GET /__agent/cache
//! - GET /__agent/metrics

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::lifecycle::LifecycleState;
use crate::server::proxy::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub lifecycle: LifecycleState,
    pub namespace: String,
    pub upstream: String,
    pub uptime_secs: u64,
}

/// Cache statistics response.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub current: String,
    pub namespaces: Vec<NamespaceStats>,
}

#[derive(Debug, Serialize)]
pub struct NamespaceStats {
    pub name: String,
    pub entries: usize,
    pub current: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let lifecycle = state.lifecycle.state().await;
    let status = if lifecycle == LifecycleState::Active {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        lifecycle,
        namespace: state.lifecycle.namespace().to_string(),
        upstream: state.config.upstream.origin.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStatsResponse>, (StatusCode, String)> {
    let internal = |e: crate::cache::CacheError| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());

    let current = state.lifecycle.namespace().to_string();
    let mut namespaces = Vec::new();
    for name in state.store.list_namespaces().await.map_err(internal)? {
        let entries = state.store.entry_count(&name).await.map_err(internal)?;
        namespaces.push(NamespaceStats {
            current: name == current,
            name,
            entries,
        });
    }

    Ok(Json(CacheStatsResponse {
        current,
        namespaces,
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
