use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use offline_agent::agent::Agent;
use offline_agent::cache::disk::DiskCacheStore;
use offline_agent::cache::memory::MemoryCacheStore;
use offline_agent::cache::SharedStore;
use offline_agent::config::{Cli, Config, StoreBackend};
use offline_agent::lifecycle::{ClientControl, LifecycleManager};
use offline_agent::metrics::Metrics;
use offline_agent::network::{HttpNetwork, SharedNetwork};
use offline_agent::server::proxy::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "offline_agent=debug,tower_http=debug"
    } else {
        "offline_agent=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("offline-agent v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    if let Some(upstream) = cli.upstream {
        config.upstream.origin = upstream;
    }
    let config = Arc::new(config);

    info!(
        namespace = %config.agent.namespace,
        bootstrap = config.agent.bootstrap.len(),
        upstream = %config.upstream.origin,
        backend = ?config.store.backend,
        "Configuration loaded"
    );

    let store: SharedStore = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryCacheStore::new()),
        StoreBackend::Disk => Arc::new(DiskCacheStore::new(&config.store.path).await?),
    };
    let network: SharedNetwork = Arc::new(HttpNetwork::new(&config.upstream)?);
    let control = Arc::new(ClientControl::new());
    let metrics = Arc::new(Metrics::new()?);

    let lifecycle = Arc::new(LifecycleManager::new(
        config.agent.clone(),
        store.clone(),
        network.clone(),
        control.clone(),
    ));

    // With the origin down and no complete generation on disk, the agent
    // stays unclaimed and passes traffic through until a retry succeeds.
    match lifecycle.start().await {
        Ok(report) => {
            if !report.failed.is_empty() {
                warn!(failed = ?report.failed, "Some stale namespaces remain");
            }
        }
        Err(e) => {
            metrics.record_install_failure();
            match config.agent.install_retry() {
                Some((initial, max)) => {
                    error!(error = %e, retry_in = ?initial, "Agent not activated, passing traffic through");
                    let lifecycle = lifecycle.clone();
                    tokio::spawn(async move {
                        let report = lifecycle.start_with_retry(initial, max).await;
                        info!(deleted = report.deleted.len(), "Agent activated after retry");
                    });
                }
                None => error!(error = %e, "Agent not activated, passing all traffic through"),
            }
        }
    }

    let agent = Arc::new(Agent::new(
        &config.agent,
        store.clone(),
        network.clone(),
        control,
        metrics.clone(),
    ));

    let state = Arc::new(AppState {
        agent,
        lifecycle,
        store,
        network,
        metrics,
        config: config.clone(),
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli.listen;
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
