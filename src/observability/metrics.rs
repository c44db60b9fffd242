//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_cache_lookups_total` (counter): hit / miss / bypass by route
//! - `gateway_cache_entries` (gauge): live cache entries
//! - `gateway_cache_evictions_total` (counter): evictions by reason
//! - `gateway_cache_invalidations_total` (counter): fired tags
//! - `gateway_cache_invalidated_entries_total` (counter): entries purged by tags
//! - `gateway_upstream_errors_total` (counter): transport failures by kind

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(route: &str, result: &'static str) {
    counter!(
        "gateway_cache_lookups_total",
        "route" => route.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("gateway_cache_entries").set(entries as f64);
}

pub fn record_cache_eviction(reason: &'static str, count: u64) {
    counter!("gateway_cache_evictions_total", "reason" => reason).increment(count);
}

pub fn record_invalidation(tags: usize, entries: usize) {
    counter!("gateway_cache_invalidations_total").increment(tags as u64);
    counter!("gateway_cache_invalidated_entries_total").increment(entries as u64);
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("gateway_upstream_errors_total", "kind" => kind).increment(1);
}
