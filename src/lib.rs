//! offline-agent: intercepting offline-cache agent.
//!
//! Sits between a page and its origin and applies one of three caching
//! policies per request:
//!   /static/…   → cache-first
//!   navigations → network-first, cached root document when offline
//!   /api/…      → network-first, JSON offline marker when offline
//!
//! Everything else passes through untouched. The install/activate lifecycle
//! seeds a versioned cache namespace and garbage-collects stale ones.

pub mod agent;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod network;
pub mod policy;
pub mod router;
pub mod server;
