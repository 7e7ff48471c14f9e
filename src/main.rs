//! `hitserve` daemon.
//!
//! ```text
//! hitserve ./public --mode race --port 8000
//! hitserve --config hitserve.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use hitserve::config::{read_config, validate_config, ConfigError, ServerConfig};
use hitserve::lifecycle::startup;
use hitserve::observability::logging;
use hitserve::Mode;

#[derive(Parser)]
#[command(name = "hitserve")]
#[command(about = "File server demonstrating a hit-counter race and its fixes", long_about = None)]
struct Cli {
    /// Directory to serve.
    root: Option<PathBuf>,

    /// TOML config file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// single, multi, race, threadsafe or ratelimit.
    #[arg(short, long)]
    mode: Option<Mode>,

    /// Full bind address, e.g. 127.0.0.1:8000.
    #[arg(long)]
    bind: Option<String>,

    /// Port on the configured bind address.
    #[arg(short, long)]
    port: Option<u16>,

    /// Sliding-window length for ratelimit mode.
    #[arg(long)]
    rate_window_ms: Option<u64>,

    /// Requests admitted per window and address in ratelimit mode.
    #[arg(long)]
    rate_max: Option<usize>,

    /// Artificial work per request in single and multi modes.
    #[arg(long)]
    request_delay_ms: Option<u64>,

    /// Gap between reading and writing a hit count.
    #[arg(long)]
    counter_delay_ms: Option<u64>,

    /// Bound on concurrently served connections (unbounded by default).
    #[arg(long)]
    max_connections: Option<usize>,

    /// Deadline for receiving a request.
    #[arg(long)]
    read_timeout_secs: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(root) = self.root {
            config.server.root = Some(root);
        }
        if let Some(mode) = self.mode {
            config.server.mode = mode;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(port) = self.port {
            // An unparsable address is left alone for validation to report.
            if let Ok(mut addr) = config.listener.bind_address.parse::<SocketAddr>() {
                addr.set_port(port);
                config.listener.bind_address = addr.to_string();
            }
        }
        if let Some(window) = self.rate_window_ms {
            config.rate_limit.window_ms = window;
        }
        if let Some(max) = self.rate_max {
            config.rate_limit.max_requests = max;
        }
        if let Some(delay) = self.request_delay_ms {
            config.simulation.request_delay_ms = delay;
        }
        if let Some(delay) = self.counter_delay_ms {
            config.simulation.counter_delay_ms = delay;
        }
        if let Some(max) = self.max_connections {
            config.listener.max_connections = Some(max);
        }
        if let Some(timeout) = self.read_timeout_secs {
            config.listener.read_timeout_secs = timeout;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability.log_filter)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hitserve starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = %config.server.mode,
        max_connections = ?config.listener.max_connections,
        read_timeout_secs = config.listener.read_timeout_secs,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
