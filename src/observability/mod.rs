//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listener and connection handler produce:
//!     → logging.rs (structured tracing events, one span per connection)
//!     → metrics.rs (request, admission and counter metrics)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
