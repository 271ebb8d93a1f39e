//! Metrics collection and exposition.
//!
//! # Metrics
//! - `kit_requests_total` (counter): server responses by method, status
//! - `kit_request_duration_seconds` (histogram): pipeline latency
//! - `kit_loads_total` (counter): segment loads by kind
//!   (`run`, `reuse`, `fallthrough`, `error`)
//! - `kit_cache_events_total` (counter): result cache events by kind
//!   (`hit`, `miss`, `expired`, `insert`)
//! - `kit_navigations_total` (counter): client navigations by outcome
//!
//! # Design Decisions
//! - Labels are static strings or status codes, never paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one response produced by the server pipeline.
pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "kit_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("kit_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_load(kind: &'static str) {
    ::metrics::counter!("kit_loads_total", "kind" => kind).increment(1);
}

pub fn record_cache(event: &'static str) {
    ::metrics::counter!("kit_cache_events_total", "event" => event).increment(1);
}

pub fn record_navigation(outcome: &'static str) {
    ::metrics::counter!("kit_navigations_total", "outcome" => outcome).increment(1);
}
