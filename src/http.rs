//! Intercepted request values.
//!
//! An [`AgentRequest`] lives for the handling of exactly one fetch: the proxy
//! builds it from the incoming HTTP request, the router classifies it and the
//! selected policy consumes it.

use bytes::Bytes;

use crate::cache::entry::RequestKey;

/// A single intercepted network request.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Upper-case HTTP method.
    pub method: String,

    /// Path and query as requested by the page, e.g. `/static/icon.png?v=2`.
    pub url: String,

    /// Top-level page load (navigation intent).
    pub navigate: bool,

    /// Request headers in arrival order. Values are kept as raw bytes.
    pub headers: Vec<(String, Bytes)>,

    /// Request body, empty for GET/HEAD.
    pub body: Bytes,
}

impl AgentRequest {
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            url: url.into(),
            navigate: false,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Shorthand for a top-level page load.
    pub fn navigation(url: impl Into<String>) -> Self {
        let mut req = Self::get(url);
        req.navigate = true;
        req
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The URL path without its query string.
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The cache identity of this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Case-insensitive lookup in a header list. Values that are not UTF-8 are
/// reported as absent; use [`find_header_bytes`] for those.
pub fn find_header<'a>(headers: &'a [(String, Bytes)], name: &str) -> Option<&'a str> {
    find_header_bytes(headers, name).and_then(|v| std::str::from_utf8(v).ok())
}

pub fn find_header_bytes<'a>(headers: &'a [(String, Bytes)], name: &str) -> Option<&'a [u8]> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_ref())
}
