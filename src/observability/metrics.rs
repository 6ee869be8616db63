//! Metrics collection and exposition.
//!
//! # Metrics
//! - `transport_connections_opened_total` (counter)
//! - `transport_connections_closed_total` (counter): by close reason
//! - `transport_active_connections` (gauge)
//! - `transport_requests_total` (counter): by method
//! - `transport_requests_completed_total` (counter)
//! - `transport_request_body_bytes` (histogram)
//! - `transport_short_circuits_total` (counter)
//! - `transport_upgrades_total` (counter)
//! - `transport_protocol_errors_total` (counter): by error kind
//! - `transport_processor_unavailable_total` (counter)
//! - `transport_pool_closes_total` (counter): by outcome

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_opened() {
    counter!("transport_connections_opened_total").increment(1);
    gauge!("transport_active_connections").increment(1.0);
}

pub fn record_connection_closed(reason: &'static str) {
    counter!("transport_connections_closed_total", "reason" => reason).increment(1);
    gauge!("transport_active_connections").decrement(1.0);
}

pub fn record_request(method: &str) {
    counter!("transport_requests_total", "method" => method.to_string()).increment(1);
}

pub fn record_request_completed(body_bytes: usize) {
    counter!("transport_requests_completed_total").increment(1);
    histogram!("transport_request_body_bytes").record(body_bytes as f64);
}

pub fn record_short_circuit() {
    counter!("transport_short_circuits_total").increment(1);
}

pub fn record_upgrade() {
    counter!("transport_upgrades_total").increment(1);
}

pub fn record_protocol_error(kind: &'static str) {
    counter!("transport_protocol_errors_total", "kind" => kind).increment(1);
}

pub fn record_processor_unavailable() {
    counter!("transport_processor_unavailable_total").increment(1);
}

pub fn record_pool_drain(closed: usize, failed: usize) {
    if closed > 0 {
        counter!("transport_pool_closes_total", "outcome" => "closed").increment(closed as u64);
    }
    if failed > 0 {
        counter!("transport_pool_closes_total", "outcome" => "failed").increment(failed as u64);
    }
}
