use std::error::Error;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hmsfeed::api::RestApi;
use hmsfeed::config::{load_config, Config, ConfigError};
use hmsfeed::store::persistence::{load_collections, save_collections};
use hmsfeed::{AppointmentAggregator, Clock, DocumentStore, HmsError, InMemoryStore, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    let (config, config_error) = load_or_default(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    if let Some(err) = config_error {
        warn!(error = %err, "Using default configuration");
    }

    run(config).await.map_err(Box::<dyn Error>::from)
}

/// A missing or unreadable config file falls back to defaults; a malformed one is fatal.
fn load_or_default(path: &Path) -> Result<(Config, Option<ConfigError>), Box<dyn Error>> {
    match load_config(path) {
        Ok(config) => Ok((config, None)),
        Err(err @ ConfigError::Io { .. }) => Ok((Config::default(), Some(err))),
        Err(err) => Err(err.into()),
    }
}

async fn run(config: Config) -> Result<(), HmsError> {
    let store = match &config.store.seed_path {
        Some(path) => Arc::new(InMemoryStore::from_collections(load_collections(path)?)),
        None => Arc::new(InMemoryStore::new()),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let documents: Arc<dyn DocumentStore> = store.clone();

    let handle = AppointmentAggregator::start(Arc::clone(&documents), Arc::clone(&clock), &config).await?;
    let api = RestApi::new(
        Arc::clone(handle.aggregator()),
        documents,
        clock,
        config.collections.clone(),
    );

    let host: IpAddr = config.api.host.parse().unwrap_or_else(|_| {
        warn!(host = %config.api.host, "Unparseable API host, binding to localhost");
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    });
    let addr = SocketAddr::new(host, config.api.port);

    // Create a channel for shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let (bound, server) = warp::serve(api.routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            shutdown_rx.await.ok();
            info!("Shutting down server...");
        })
        .map_err(|e| HmsError::Io(std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, e.to_string())))?;

    info!(%bound, "Serving appointment views");
    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("Ctrl+C received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    if let Err(e) = server_handle.await {
        error!(error = %e, "Server task failed");
    }

    handle.shutdown().await;

    if let Some(path) = &config.store.dump_path {
        save_collections(path, &store.export().await)?;
        info!(path = %path.display(), "Store contents written");
    }

    info!("Shutdown complete");
    Ok(())
}
