//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_gate_decisions_total` (counter): gate outcomes by `outcome`
//! - `guard_security_events_total` (counter): emitted events by `event_type`
//! - `guard_csrf_tokens_issued_total` (counter)
//! - `guard_csrf_redemptions_total` (counter): by `result` (accepted/rejected)
//! - `guard_auth_failures_total` (counter)
//!
//! Without an installed recorder every call is a no-op, so unit tests need
//! no setup.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_gate_decision(outcome: &'static str) {
    counter!("guard_gate_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_security_event(event_type: &'static str) {
    counter!("guard_security_events_total", "event_type" => event_type).increment(1);
}

pub fn record_csrf_issued() {
    counter!("guard_csrf_tokens_issued_total").increment(1);
}

pub fn record_csrf_redemption(accepted: bool) {
    let result = if accepted { "accepted" } else { "rejected" };
    counter!("guard_csrf_redemptions_total", "result" => result).increment(1);
}

pub fn record_auth_failure() {
    counter!("guard_auth_failures_total").increment(1);
}
