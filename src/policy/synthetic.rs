//! Locally constructed last-resort responses.

use serde::Serialize;

use crate::cache::entry::CachedResponse;

pub const OFFLINE_STATUS: u16 = 503;

/// Body of the JSON offline marker. Field order is the wire order.
#[derive(Debug, Serialize)]
struct OfflineMarker {
    ok: bool,
    error: &'static str,
}

/// `503` with a plain-text `Offline` body.
pub fn offline_text() -> CachedResponse {
    CachedResponse::new(OFFLINE_STATUS)
        .with_header("Content-Type", "text/plain;charset=UTF-8")
        .with_body("Offline")
}

/// `503` with `{"ok":false,"error":"offline"}`.
pub fn offline_json() -> CachedResponse {
    let marker = OfflineMarker {
        ok: false,
        error: "offline",
    };
    // Serializing a two-field struct of plain scalars cannot fail.
    let body = serde_json::to_vec(&marker).unwrap_or_default();
    CachedResponse::new(OFFLINE_STATUS)
        .with_header("Content-Type", "application/json")
        .with_body(body)
}
