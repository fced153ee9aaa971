// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the cache layer.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `pipelined_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: get_string, put_entity, scan, ...
//! - `status`: success, error, rejected
//! - `kind`: set, compare_and_set, delete, scored_add

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════
// FACADE - Direct operations
// ═══════════════════════════════════════════════════════════════════════════

/// Record a facade operation outcome
pub fn record_operation(operation: &str, status: &str) {
    counter!(
        "pipelined_cache_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "pipelined_cache_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a request rejected before reaching the store
pub fn record_validation_error(operation: &str) {
    counter!(
        "pipelined_cache_validation_errors_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// PIPELINE - Batching engine
// ═══════════════════════════════════════════════════════════════════════════

/// Record an op accepted into a batch
pub fn record_enqueue(kind: &str) {
    counter!(
        "pipelined_cache_enqueued_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record an enqueue attempt that hit an unavailable batch
pub fn record_batch_retry(reason: &str) {
    counter!(
        "pipelined_cache_batch_retries_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record an enqueue that gave up after exhausting its attempts
pub fn record_enqueue_rejected(kind: &str) {
    counter!(
        "pipelined_cache_enqueue_rejected_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a batch being rotated out for execution
pub fn record_batch_rotation() {
    counter!("pipelined_cache_batch_rotations_total").increment(1);
}

/// Record an executed batch: its size and how many ops failed
pub fn record_batch_executed(total: usize, failed: usize) {
    histogram!("pipelined_cache_batch_size").record(total as f64);
    let status = if failed == 0 { "success" } else { "partial" };
    counter!(
        "pipelined_cache_batches_executed_total",
        "status" => status
    )
    .increment(1);
    if failed > 0 {
        counter!("pipelined_cache_batch_ops_failed_total").increment(failed as u64);
    }
}

/// Set number of batch executions still running
pub fn set_batches_in_flight(count: usize) {
    gauge!("pipelined_cache_batches_in_flight").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// SCAN
// ═══════════════════════════════════════════════════════════════════════════

/// Record a completed pattern scan
pub fn record_scan(pages: usize, entries: usize) {
    histogram!("pipelined_cache_scan_pages").record(pages as f64);
    histogram!("pipelined_cache_scan_entries").record(entries as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// BACKEND HEALTH
// ═══════════════════════════════════════════════════════════════════════════

/// Set backend health status (1 = healthy, 0 = unhealthy)
pub fn set_backend_healthy(healthy: bool) {
    gauge!("pipelined_cache_backend_healthy").set(if healthy { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must not panic.
    #[test]
    fn test_metrics_without_recorder() {
        record_operation("get_string", "success");
        record_latency("get_string", Duration::from_millis(3));
        record_validation_error("put_string");
        record_enqueue("set");
        record_batch_retry("retired");
        record_enqueue_rejected("set");
        record_batch_rotation();
        record_batch_executed(10, 1);
        set_batches_in_flight(2);
        record_scan(3, 42);
        set_backend_healthy(true);
    }
}
