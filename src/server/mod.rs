//! HTTP front end: the intercepting proxy the page talks to.
//!
//! - [`proxy`]: Shared state, router construction and the intercept handler
//! - [`admin`]: Health, cache and metrics endpoints under `/__agent/`

pub mod admin;
pub mod proxy;
