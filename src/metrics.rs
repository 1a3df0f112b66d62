//! Prometheus counters for intercepted traffic.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::policy::Outcome;
use crate::router::Category;

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    install_failures: prometheus::IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "offline_agent_requests_total",
                "Intercepted requests by category and outcome",
            ),
            &["category", "outcome"],
        )?;
        let install_failures = prometheus::IntCounter::new(
            "offline_agent_install_failures_total",
            "Failed bootstrap installs",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(install_failures.clone()))?;

        Ok(Self {
            registry,
            requests,
            install_failures,
        })
    }

    pub fn record(&self, category: Category, outcome: Outcome) {
        self.requests
            .with_label_values(&[category.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn record_pass_through(&self) {
        self.requests
            .with_label_values(&[Category::PassThrough.as_str(), "pass_through"])
            .inc();
    }

    pub fn record_install_failure(&self) {
        self.install_failures.inc();
    }

    pub fn requests(&self, category: Category, outcome: &str) -> u64 {
        self.requests
            .with_label_values(&[category.as_str(), outcome])
            .get()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_render() {
        let metrics = Metrics::new().unwrap();
        metrics.record(Category::Api, Outcome::OfflineSynthetic);
        metrics.record(Category::Api, Outcome::OfflineSynthetic);
        metrics.record_pass_through();

        assert_eq!(metrics.requests(Category::Api, "offline_synthetic"), 2);
        assert_eq!(metrics.requests(Category::PassThrough, "pass_through"), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("offline_agent_requests_total"));
        assert!(text.contains(r#"category="api""#));
    }
}
