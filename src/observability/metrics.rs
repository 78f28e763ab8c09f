//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by pipeline, outcome, status
//! - `router_request_duration_seconds` (histogram): latency by pipeline, outcome
//! - `router_session_persist_failures_total` (counter)
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - The Prometheus exporter is opt-in via configuration

use axum::http::StatusCode;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::dispatch::Outcome;

/// Install the Prometheus exporter, serving scrapes on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(pipeline: &str, outcome: Outcome, status: StatusCode, elapsed: Duration) {
    metrics::counter!(
        "router_requests_total",
        "pipeline" => pipeline.to_string(),
        "outcome" => outcome.as_str(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(
        "router_request_duration_seconds",
        "pipeline" => pipeline.to_string(),
        "outcome" => outcome.as_str()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_session_persist_failure() {
    metrics::counter!("router_session_persist_failures_total").increment(1);
}
