//! Metrics recording.
//!
//! # Metrics
//! - `memlimiter_requests_total` (counter): admission decisions by outcome
//! - `memlimiter_gc_percent` (gauge): last applied GC pacing target
//! - `memlimiter_throttling_percentage` (gauge): last applied throttling threshold
//! - `memlimiter_utilization` (gauge): projected next collection / allocation budget
//! - `memlimiter_allocation_budget_bytes` (gauge): limit minus unmanaged consumers
//! - `memlimiter_controller_output` (gauge): saturated controller output

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::stats::{ControlParameters, ControllerStats};

/// Installs the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_admission(allowed: bool) {
    let outcome = if allowed { "passed" } else { "throttled" };
    counter!("memlimiter_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_control_parameters(params: &ControlParameters) {
    gauge!("memlimiter_gc_percent").set(params.gc_percent as f64);
    gauge!("memlimiter_throttling_percentage").set(params.throttling_percentage as f64);
}

pub fn record_controller_state(stats: &ControllerStats) {
    gauge!("memlimiter_utilization").set(stats.memory_budget.utilization);
    gauge!("memlimiter_allocation_budget_bytes").set(stats.memory_budget.allocation_budget as f64);
    gauge!("memlimiter_controller_output").set(stats.nextgc.output);
}
