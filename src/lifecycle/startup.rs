//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and (optionally) the metrics exporter
//! - Resolve the listen and gateway addresses
//! - Bind the listener and serve until a shutdown signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last, so traffic only arrives once everything is ready

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::{load_config, resolve_addrs, ConfigError, ProxyArgs, ProxyConfig};
use crate::http::proxy::UpstreamError;
use crate::http::HttpServer;
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Run the proxy until SIGINT/SIGTERM.
pub async fn run(args: ProxyArgs) -> Result<(), StartupError> {
    let config = load_config(args)?;
    logging::init_logging(config.observability.log_format);

    let addrs = resolve_addrs(&config).await?;
    if let Some(raw) = &config.observability.metrics_address {
        let addr: SocketAddr = raw
            .parse()
            .map_err(|_| StartupError::MetricsAddress(raw.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(addrs.listen, config.listener.max_connections).await?;
    log_startup(&config, listener.local_addr().unwrap_or(addrs.listen));

    let server = HttpServer::new(config, addrs.backend)?;
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, receiver).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_startup(config: &ProxyConfig, local: SocketAddr) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %local,
        gateway = %config.gateway.authority(),
        setup_ui = config.setup.enabled,
        config_path = %config.setup.config_path.display(),
        "setup-proxy listening"
    );
    match serde_json::to_string(config) {
        Ok(effective) => tracing::debug!(config = %effective, "Effective configuration"),
        Err(e) => tracing::debug!(error = %e, "Could not serialize configuration"),
    }
}
