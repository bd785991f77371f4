//! Metrics collection and exposition.
//!
//! # Metrics
//! - `socket_guard_decisions_total` (counter): policy outcomes by `outcome`
//!   (`bypass`, `forward`, `rewrite`, `reject`)
//! - `socket_guard_requests_total` (counter): responses by method and status
//! - `socket_guard_request_duration_seconds` (histogram): end-to-end latency
//!
//! # Design Decisions
//! - Recording is a no-op unless the Prometheus exporter is installed

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one policy decision.
pub fn record_decision(outcome: &'static str) {
    counter!("socket_guard_decisions_total", "outcome" => outcome).increment(1);
}

/// Count one finished request and record its latency.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "socket_guard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("socket_guard_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}
