//! Runtime configuration for offline-agent.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! The namespace and bootstrap set are build-time constants of a deploy: they
//! are read at install/activate/fetch time and never written at runtime.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "offline-agent", about = "Intercepting offline-cache proxy")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: String,

    /// Upstream origin, overrides `upstream.origin` from the config file.
    #[arg(long)]
    pub upstream: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub upstream: UpstreamConfig,
    pub store: StoreConfig,
}

/// What the agent caches and how it routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Current cache generation, `<app-name>-static-v<N>`.
    pub namespace: String,

    /// URLs fetched and stored on install, in order.
    pub bootstrap: Vec<String>,

    /// Path prefix served cache-first.
    pub static_prefix: String,

    /// Path prefix served network-first with a JSON offline marker.
    pub api_prefix: String,

    /// Cached document returned for navigations while offline.
    pub root_document: String,

    /// First delay before retrying a failed start, in seconds (0 = no retry).
    pub install_retry_secs: u64,

    /// Upper bound for the doubling retry delay, in seconds.
    pub install_retry_max_secs: u64,
}

impl AgentConfig {
    /// The `(initial, max)` retry delays, or `None` when retrying is off.
    pub fn install_retry(&self) -> Option<(Duration, Duration)> {
        (self.install_retry_secs > 0).then(|| {
            (
                Duration::from_secs(self.install_retry_secs),
                Duration::from_secs(self.install_retry_max_secs.max(self.install_retry_secs)),
            )
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: "cartracker-static-v5".to_string(),
            bootstrap: vec![
                "/".to_string(),
                "/static/autoprudente-favicon.png?v=2".to_string(),
                "/static/manifest.webmanifest".to_string(),
            ],
            static_prefix: "/static/".to_string(),
            api_prefix: "/api/".to_string(),
            root_document: "/".to_string(),
            install_retry_secs: 5,
            install_retry_max_secs: 300,
        }
    }
}

/// The origin the agent fetches from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `http://127.0.0.1:8000`.
    pub origin: String,

    /// Per-request timeout in seconds (0 = rely on the transport's own).
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Disk,
}

/// Where cache entries live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Root directory for the disk backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Disk,
            path: PathBuf::from("/tmp/offline-agent"),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Reject configurations the router cannot honour.
    pub fn validate(&self) -> anyhow::Result<()> {
        let agent = &self.agent;
        anyhow::ensure!(!agent.namespace.is_empty(), "agent.namespace must not be empty");
        for (name, value) in [
            ("agent.static_prefix", &agent.static_prefix),
            ("agent.api_prefix", &agent.api_prefix),
            ("agent.root_document", &agent.root_document),
        ] {
            anyhow::ensure!(value.starts_with('/'), "{name} must start with '/': {value:?}");
        }
        for url in &agent.bootstrap {
            anyhow::ensure!(url.starts_with('/'), "bootstrap URL must be a path: {url:?}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.namespace, "cartracker-static-v5");
        assert_eq!(cfg.agent.bootstrap.len(), 3);
        assert_eq!(cfg.agent.bootstrap[1], "/static/autoprudente-favicon.png?v=2");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"agent": {"namespace": "app-v1"}, "store": {"backend": "memory"}}"#)
                .unwrap();
        assert_eq!(cfg.agent.namespace, "app-v1");
        assert_eq!(cfg.agent.api_prefix, "/api/");
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.upstream.timeout_secs, 30);
    }

    #[test]
    fn test_install_retry_delays() {
        let mut agent = AgentConfig::default();
        assert_eq!(
            agent.install_retry(),
            Some((Duration::from_secs(5), Duration::from_secs(300)))
        );

        agent.install_retry_max_secs = 1;
        assert_eq!(
            agent.install_retry(),
            Some((Duration::from_secs(5), Duration::from_secs(5)))
        );

        agent.install_retry_secs = 0;
        assert_eq!(agent.install_retry(), None);
    }

    #[test]
    fn test_validate_rejects_relative_prefix() {
        let mut cfg = Config::default();
        cfg.agent.static_prefix = "static/".to_string();
        assert!(cfg.validate().is_err());
    }
}
