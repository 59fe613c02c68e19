//! Metrics collection and exposition.
//!
//! # Metrics
//! - `smart_route_decisions_total` (counter): decisions by `stage`
//! - `smart_route_reloads_total` (counter): reload attempts by `outcome`
//! - `smart_route_rules` (gauge): rules in the installed snapshot
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are static strings, no per-request cardinality

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_decision(stage: &'static str) {
    metrics::counter!("smart_route_decisions_total", "stage" => stage).increment(1);
}

pub fn record_reload(outcome: &'static str) {
    metrics::counter!("smart_route_reloads_total", "outcome" => outcome).increment(1);
}

pub fn set_rule_count(rules: usize) {
    metrics::gauge!("smart_route_rules").set(rules as f64);
}
