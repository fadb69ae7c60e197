//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define routing metrics (requests, latency, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `sitemap_requests_total` (counter): requests by method, outcome, status
//! - `sitemap_request_duration_seconds` (histogram): routing latency by outcome
//! - `sitemap_reloads_total` (counter): configuration reloads by result
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Outcome labels mirror the routing completion (pipeline, redirect, ...)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one routed request.
pub fn record_request(method: &str, outcome: &'static str, status: u16, start_time: Instant) {
    counter!(
        "sitemap_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("sitemap_request_duration_seconds", "outcome" => outcome)
        .record(start_time.elapsed().as_secs_f64());
}

/// Record a configuration reload attempt.
pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("sitemap_reloads_total", "result" => result).increment(1);
}
