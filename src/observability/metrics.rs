//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hitserve_requests_total` (counter): responses by mode and status
//! - `hitserve_request_duration_seconds` (histogram): time from accept to response
//! - `hitserve_rate_limited_total` (counter): requests rejected with 429
//! - `hitserve_active_connections` (gauge): connections currently being served
//! - `hitserve_counter_increments_total` (counter): hit counter updates by consistency
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::hits::Consistency;
use crate::mode::Mode;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(mode: Mode, status: u16, start: Instant) {
    ::metrics::counter!(
        "hitserve_requests_total",
        "mode" => mode.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("hitserve_request_duration_seconds", "mode" => mode.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("hitserve_rate_limited_total").increment(1);
}

pub fn record_increment(consistency: Consistency) {
    let label = match consistency {
        Consistency::Racy => "racy",
        Consistency::Locked => "locked",
    };
    ::metrics::counter!("hitserve_counter_increments_total", "consistency" => label).increment(1);
}

pub fn connection_opened() {
    ::metrics::gauge!("hitserve_active_connections").increment(1.0);
}

pub fn connection_closed() {
    ::metrics::gauge!("hitserve_active_connections").decrement(1.0);
}
