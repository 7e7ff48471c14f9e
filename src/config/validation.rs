//! Configuration validation.
//!
//! Returns every problem found, not just the first.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a [`ServerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("listener.max_connections must be greater than zero")]
    ZeroMaxConnections,
    #[error("listener.read_timeout_secs must be greater than zero")]
    ZeroReadTimeout,
    #[error("no directory to serve (set server.root or pass one on the command line)")]
    MissingRoot,
    #[error("server.root {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
    #[error("rate_limit.window_ms must be greater than zero")]
    ZeroWindow,
    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check value ranges and the served root.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == Some(0) {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.listener.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroReadTimeout);
    }

    match &config.server.root {
        None => errors.push(ValidationError::MissingRoot),
        Some(root) if !root.is_dir() => errors.push(ValidationError::RootNotDirectory(root.clone())),
        Some(_) => {}
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
