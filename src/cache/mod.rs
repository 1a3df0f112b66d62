//! Versioned response cache.
//!
//! - [`entry`]: RequestKey, CachedResponse, CacheEntry
//! - [`store`]: The CacheStore trait and namespace handles
//! - [`memory`]: In-memory backend
//! - [`disk`]: Directory-per-namespace backend

pub mod disk;
pub mod entry;
pub mod memory;
pub mod store;

pub use entry::{CacheEntry, CachedResponse, RequestKey};
pub use store::{CacheError, CacheStore, NamespaceHandle, SharedStore};
