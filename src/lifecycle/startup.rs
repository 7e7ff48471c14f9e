//! Startup orchestration.
//!
//! Subsystems come up in dependency order and any failure is fatal:
//! metrics first, then the listener, then the handler, then the signal
//! watcher. Traffic is only accepted once everything is ready.

use std::net::SocketAddr;

use crate::config::ServerConfig;
use crate::http::{FileServer, ServeError};
use crate::lifecycle::{signals, Shutdown};
use crate::net::Listener;
use crate::observability::metrics;

/// Run the server described by an already validated `config` until an
/// interrupt arrives and in-flight connections have drained.
pub async fn run(config: ServerConfig) -> Result<(), ServeError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| ServeError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = FileServer::new(&config)?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::trigger_on_interrupt(shutdown.clone()));

    server.run(listener, shutdown.subscribe()).await
}
