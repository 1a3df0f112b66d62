//! Request classification.
//!
//! Every intercepted request lands in exactly one [`Category`]. Checks run in
//! the fixed order Static → Navigation → Api and the first match wins, so a
//! navigation to a path under the static prefix is Static.

use serde::Serialize;

use crate::config::AgentConfig;
use crate::http::AgentRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Cache-first.
    Static,
    /// Network-first, cached root document when offline.
    Navigation,
    /// Network-first, synthetic JSON marker when offline.
    Api,
    /// Not managed by the agent; default network handling.
    PassThrough,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Static => "static",
            Category::Navigation => "navigation",
            Category::Api => "api",
            Category::PassThrough => "pass_through",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix-based classifier.
#[derive(Debug, Clone)]
pub struct Router {
    static_prefix: String,
    api_prefix: String,
}

impl Router {
    pub fn new(static_prefix: impl Into<String>, api_prefix: impl Into<String>) -> Self {
        Self {
            static_prefix: static_prefix.into(),
            api_prefix: api_prefix.into(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(&config.static_prefix, &config.api_prefix)
    }

    pub fn classify(&self, request: &AgentRequest) -> Category {
        let path = request.path();
        if path.starts_with(&self.static_prefix) {
            Category::Static
        } else if request.navigate {
            Category::Navigation
        } else if path.starts_with(&self.api_prefix) {
            Category::Api
        } else {
            Category::PassThrough
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_categories() {
        let router = Router::default();
        assert_eq!(router.classify(&AgentRequest::get("/static/app.js")), Category::Static);
        assert_eq!(router.classify(&AgentRequest::navigation("/cars")), Category::Navigation);
        assert_eq!(router.classify(&AgentRequest::get("/api/status")), Category::Api);
        assert_eq!(router.classify(&AgentRequest::get("/favicon.ico")), Category::PassThrough);
    }

    #[test]
    fn test_precedence_static_over_navigation_over_api() {
        let router = Router::default();
        assert_eq!(
            router.classify(&AgentRequest::navigation("/static/index.html")),
            Category::Static
        );
        assert_eq!(
            router.classify(&AgentRequest::navigation("/api/report")),
            Category::Navigation
        );
    }

    #[test]
    fn test_prefix_is_matched_on_path_only() {
        let router = Router::default();
        // Query strings never make a request static.
        assert_eq!(
            router.classify(&AgentRequest::get("/download?from=/static/x")),
            Category::PassThrough
        );
        // `/static` without the trailing slash is not under the prefix.
        assert_eq!(router.classify(&AgentRequest::get("/static")), Category::PassThrough);
        assert_eq!(router.classify(&AgentRequest::get("/apis/x")), Category::PassThrough);
    }

    #[test]
    fn test_method_does_not_affect_category() {
        let router = Router::default();
        assert_eq!(
            router.classify(&AgentRequest::new("POST", "/api/cars")),
            Category::Api
        );
        assert_eq!(
            router.classify(&AgentRequest::new("POST", "/static/upload")),
            Category::Static
        );
    }
}
