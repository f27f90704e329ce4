//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, rate-limit rejections)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by terminal state and status
//! - `gateway_request_duration_seconds` (histogram): pipeline latency
//! - `gateway_rate_limited_total` (counter): requests rejected with 429
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels stay low-cardinality: no paths, no client keys

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
pub const RATE_LIMITED_TOTAL: &str = "gateway_rate_limited_total";

#[derive(Debug, Error)]
#[error("Failed to install metrics exporter: {0}")]
pub struct MetricsError(String);

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError(e.to_string()))?;

    describe_counter!(REQUESTS_TOTAL, "Requests by terminal pipeline state and status");
    describe_histogram!(REQUEST_DURATION, "Time spent in the request pipeline");
    describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by the rate limiter");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(outcome: &'static str, status: u16, duration: Duration) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome, "status" => status.to_string()).increment(1);
    histogram!(REQUEST_DURATION, "outcome" => outcome).record(duration.as_secs_f64());
}

pub fn record_rate_limited() {
    counter!(RATE_LIMITED_TOTAL).increment(1);
}
