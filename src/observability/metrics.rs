//! Metrics collection and exposition.
//!
//! # Metrics
//! - `push_lifecycle_transitions_total` (counter): by `event`
//! - `push_messages_published_total` (counter): by `topic`
//! - `push_message_receivers` (histogram): sessions reached per publish
//! - `push_messages_delivered_total` (counter)
//! - `push_messages_dropped_total` (counter): queue overflow
//! - `push_subscription_failures_total` (counter)
//! - `push_sessions_active` (gauge)
//! - `push_http_requests_total` (counter): by `route`, `status`

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_lifecycle(event: &'static str) {
    metrics::counter!("push_lifecycle_transitions_total", "event" => event).increment(1);
}

pub fn record_publish(topic: &str, receivers: usize) {
    metrics::counter!("push_messages_published_total", "topic" => topic.to_string()).increment(1);
    metrics::histogram!("push_message_receivers").record(receivers as f64);
}

pub fn record_delivery() {
    metrics::counter!("push_messages_delivered_total").increment(1);
}

pub fn record_message_dropped() {
    metrics::counter!("push_messages_dropped_total").increment(1);
}

pub fn record_subscription_failure() {
    metrics::counter!("push_subscription_failures_total").increment(1);
}

pub fn record_active_sessions(count: usize) {
    metrics::gauge!("push_sessions_active").set(count as f64);
}

pub fn record_request(route: String, status: u16) {
    metrics::counter!(
        "push_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}
