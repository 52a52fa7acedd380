//! Metrics collection and exposition.
//!
//! # Metrics
//! - `setup_proxy_requests_total` (counter): requests by mode and status
//! - `setup_proxy_upgrades_total` (counter): upgrade attempts by outcome
//! - `setup_proxy_gateway_calls_total` (counter): downstream calls by method, outcome
//! - `setup_proxy_gateway_call_duration_seconds` (histogram): downstream call latency
//! - `setup_proxy_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Labels are low-cardinality (never paths or tokens)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "setup_proxy_requests_total";
pub const UPGRADES_TOTAL: &str = "setup_proxy_upgrades_total";
pub const GATEWAY_CALLS_TOTAL: &str = "setup_proxy_gateway_calls_total";
pub const GATEWAY_CALL_DURATION_SECONDS: &str = "setup_proxy_gateway_call_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "setup_proxy_active_connections";

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request. `mode` is "setup" or "proxy".
pub fn record_request(mode: &'static str, status: u16) {
    counter!(REQUESTS_TOTAL, "mode" => mode, "status" => status.to_string()).increment(1);
}

/// Record an upgrade attempt outcome ("spliced", "rejected", "refused", "upstream_error").
pub fn record_upgrade(outcome: &'static str) {
    counter!(UPGRADES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_gateway_call(method: &str, success: bool, start: Instant) {
    let outcome = if success { "ok" } else { "error" };
    counter!(GATEWAY_CALLS_TOTAL, "method" => method.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!(GATEWAY_CALL_DURATION_SECONDS, "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}
