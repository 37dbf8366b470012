//! Metrics collection and exposition.
//!
//! # Metrics
//! - `settlement_decisions_total` (counter): decisions by method, outcome
//! - `settlement_payouts_total` (counter): broadcast payouts by result
//! - `settlement_rate_served_total` (counter): oracle rates by origin
//! - `settlement_rpc_healthy` (gauge): 1=healthy, 0=unhealthy

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count a processed decision by payout method and outcome.
pub fn record_decision(method: &'static str, outcome: &'static str) {
    counter!("settlement_decisions_total", "method" => method, "outcome" => outcome).increment(1);
}

/// Count a broadcast payout by result.
pub fn record_payout(result: &'static str) {
    counter!("settlement_payouts_total", "result" => result).increment(1);
}

/// Count an oracle rate served by origin (fresh/cached/stale/fallback).
pub fn record_rate_served(origin: &'static str) {
    counter!("settlement_rate_served_total", "origin" => origin).increment(1);
}

/// Record blockchain RPC health.
pub fn record_rpc_health(healthy: bool) {
    gauge!("settlement_rpc_healthy").set(if healthy { 1.0 } else { 0.0 });
}
