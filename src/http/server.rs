//! Accept loop and dispatch.
//!
//! # Responsibilities
//! - Accept connections until shutdown is triggered
//! - Hand each one to the connection handler, inline (`single`) or on its
//!   own task (every other mode)
//! - Track in-flight connections and give them a grace period on shutdown

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::http::handler::ConnectionHandler;
use crate::http::resolve::PathResolver;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::mode::{Dispatch, Mode};
use crate::net::{Accepted, ConnectionTracker, Listener, ListenerError};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Errors that stop the server before or while it runs.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("no directory to serve")]
    MissingRoot,
    #[error("cannot serve {}: {source}", .path.display())]
    Root {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),
    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// File server: a connection handler behind an accept loop.
pub struct FileServer {
    handler: Arc<ConnectionHandler>,
    tracker: ConnectionTracker,
    grace: Duration,
}

impl FileServer {
    /// Build the server for `config`. The root is canonicalized here, once.
    pub fn new(config: &ServerConfig) -> Result<Self, ServeError> {
        let root = config.server.root.as_deref().ok_or(ServeError::MissingRoot)?;
        let resolver = PathResolver::new(root).map_err(|source| ServeError::Root {
            path: root.to_path_buf(),
            source,
        })?;

        tracing::info!(
            root = %resolver.root().display(),
            mode = %config.server.mode,
            "File server configured"
        );
        let handler = ConnectionHandler::for_mode(config, resolver);
        if let Some(limiter) = handler.limiter() {
            tracing::info!(
                window_ms = limiter.window().as_millis() as u64,
                max_requests = limiter.max_requests(),
                "Rate limiting enabled"
            );
        }

        Ok(Self {
            handler: Arc::new(handler),
            tracker: ConnectionTracker::new(),
            grace: config.shutdown.grace(),
        })
    }

    pub fn handler(&self) -> Arc<ConnectionHandler> {
        Arc::clone(&self.handler)
    }

    pub fn mode(&self) -> Mode {
        self.handler.mode()
    }

    /// Accept and serve until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) -> Result<(), ServeError> {
        let dispatch = self.mode().dispatch();
        tracing::info!(
            address = %listener.local_addr().map_err(ListenerError::Accept)?,
            mode = %self.mode(),
            ?dispatch,
            "File server accepting connections"
        );

        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(accepted) => self.dispatch(dispatch, accepted).await,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        tracing::info!(in_flight = self.tracker.active_count(), "Stopped accepting");
        if tokio::time::timeout(self.grace, self.tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                in_flight = self.tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }
        tracing::info!("File server stopped");
        Ok(())
    }

    async fn dispatch(&self, dispatch: Dispatch, accepted: Accepted) {
        let Accepted { stream, peer, permit } = accepted;
        let guard = self.tracker.track();
        let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer, mode = %self.mode());
        let handler = Arc::clone(&self.handler);

        let work = async move {
            handler.serve(stream, peer).await;
            drop(permit);
            drop(guard);
        }
        .instrument(span);

        match dispatch {
            Dispatch::Inline => work.await,
            Dispatch::Spawn => {
                tokio::spawn(work);
            }
        }
    }
}
