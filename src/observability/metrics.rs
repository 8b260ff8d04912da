//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by route, until the body is sent
//! - `gateway_active_connections` (gauge): open client connections
//!
//! # Design Decisions
//! - Without an installed recorder every call here is a no-op
//! - Labels stay low-cardinality: route names, never raw paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Label used for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "none";

/// Serve Prometheus metrics on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    metrics::gauge!("gateway_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("gateway_active_connections").decrement(1.0);
}
