// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the saved-item engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `cookbook_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: save, unsave, toggle_favorite, mark_cooked, unmark_cooked, clear_all
//! - `operation`: read, write, erase, refresh
//! - `status`: success, error, stale
//! - `source`: push, reconcile

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record a locally applied mutation
pub fn record_mutation(kind: &str) {
    counter!(
        "cookbook_sync_mutations_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a remote write that came back with an error
pub fn record_remote_failure(kind: &str) {
    counter!(
        "cookbook_sync_remote_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record an in-memory rollback after a failed remote write
pub fn record_rollback(kind: &str) {
    counter!(
        "cookbook_sync_rollbacks_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a local cache operation failure
pub fn record_cache_failure(operation: &str) {
    counter!(
        "cookbook_sync_cache_failures_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a remote snapshot replacing local state
pub fn record_snapshot_applied(source: &str) {
    counter!(
        "cookbook_sync_snapshots_applied_total",
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record a reconcile attempt and its outcome
pub fn record_reconcile(status: &str) {
    counter!(
        "cookbook_sync_reconciles_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an identity switch (login, logout, account change)
pub fn record_identity_switch() {
    counter!("cookbook_sync_identity_switches_total").increment(1);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "cookbook_sync_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Set current saved-item count
pub fn set_saved_items(count: usize) {
    gauge!("cookbook_sync_saved_items").set(count as f64);
}

/// Set number of remote writes currently in flight
pub fn set_in_flight_writes(count: usize) {
    gauge!("cookbook_sync_in_flight_writes").set(count as f64);
}

/// Record an engine state transition
pub fn set_engine_state(state: &str) {
    counter!(
        "cookbook_sync_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($op:expr) => {
        $crate::metrics::LatencyTimer::new($op)
    };
}
