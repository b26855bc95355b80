//! Prometheus metrics and telemetry for the progression performance layer
//!
//! This module provides process-wide metrics for monitoring cache
//! effectiveness, pool pressure, scheduler throughput, and memory health.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram_vec, Counter, CounterVec, Encoder, Gauge, GaugeVec, HistogramVec,
    TextEncoder,
};

lazy_static! {
    // === Cache ===

    /// Cache lookups by category and result
    pub static ref CACHE_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "progression_cache_lookups_total",
        "Cache lookups by category and result",
        &["category", "result"]
    ).unwrap();

    /// Cache evictions by category
    pub static ref CACHE_EVICTIONS_TOTAL: CounterVec = register_counter_vec!(
        "progression_cache_evictions_total",
        "Entries evicted by capacity pressure",
        &["category"]
    ).unwrap();

    /// Compute-on-miss duration by category
    pub static ref COMPUTE_DURATION: HistogramVec = register_histogram_vec!(
        "progression_compute_duration_seconds",
        "Derived-data compute latency on cache miss",
        &["category"],
        vec![0.0001, 0.001, 0.01, 0.1, 1.0]
    ).unwrap();

    // === Pools ===

    /// Pool utilization by record type
    pub static ref POOL_UTILIZATION: GaugeVec = register_gauge_vec!(
        "progression_pool_utilization",
        "Pool utilization (0.0 to 1.0) by record type",
        &["type"]
    ).unwrap();

    // === Scheduler ===

    /// Updates dispatched to handlers
    pub static ref UPDATES_EXECUTED_TOTAL: Counter = register_counter!(
        "progression_updates_executed_total",
        "UI updates dispatched to handlers"
    ).unwrap();

    /// Updates suppressed by dirty-checking
    pub static ref UPDATES_SUPPRESSED_TOTAL: Counter = register_counter!(
        "progression_updates_suppressed_total",
        "UI updates dropped by dirty-check suppression"
    ).unwrap();

    /// Ticks that overran the frame budget
    pub static ref FRAME_DROPS_TOTAL: Counter = register_counter!(
        "progression_frame_drops_total",
        "Scheduling ticks that overran the frame budget"
    ).unwrap();

    /// Requests currently queued
    pub static ref UPDATE_QUEUE_DEPTH: Gauge = register_gauge!(
        "progression_update_queue_depth",
        "Update requests currently queued"
    ).unwrap();

    // === Memory ===

    /// Process memory usage per the latest sample
    pub static ref MEMORY_USED_BYTES: Gauge = register_gauge!(
        "progression_memory_used_bytes",
        "Process memory usage per the latest sample"
    ).unwrap();

    /// Memory usage as a fraction of total
    pub static ref MEMORY_USAGE_RATIO: Gauge = register_gauge!(
        "progression_memory_usage_ratio",
        "Memory usage fraction (0.0 to 1.0) per the latest sample"
    ).unwrap();

    /// Tracked references registered for leak detection
    pub static ref TRACKED_REFERENCES: Gauge = register_gauge!(
        "progression_tracked_references",
        "Objects registered for leak detection"
    ).unwrap();

    /// Memory warnings emitted
    pub static ref MEMORY_WARNINGS_TOTAL: CounterVec = register_counter_vec!(
        "progression_memory_warnings_total",
        "Memory threshold warnings by level",
        &["level"]
    ).unwrap();
}

/// Initialize the metrics system
pub fn init() {
    MEMORY_USAGE_RATIO.set(0.0);
    UPDATE_QUEUE_DEPTH.set(0.0);
    tracing::debug!("Metrics system initialized");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a cache lookup
#[inline]
pub fn record_cache_lookup(category: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_LOOKUPS_TOTAL.with_label_values(&[category, result]).inc();
}

/// Record a compute-on-miss duration
#[inline]
pub fn record_compute(category: &str, duration_secs: f64) {
    COMPUTE_DURATION
        .with_label_values(&[category])
        .observe(duration_secs);
}

/// Update a pool's utilization gauge
#[inline]
pub fn update_pool_utilization(type_tag: &str, utilization: f64) {
    POOL_UTILIZATION
        .with_label_values(&[type_tag])
        .set(utilization);
}

/// Record the outcome of one scheduling tick
#[inline]
pub fn record_tick(executed: u64, frame_dropped: bool, queue_depth: usize) {
    UPDATES_EXECUTED_TOTAL.inc_by(executed as f64);
    if frame_dropped {
        FRAME_DROPS_TOTAL.inc();
    }
    UPDATE_QUEUE_DEPTH.set(queue_depth as f64);
}

/// Record a suppressed update
#[inline]
pub fn record_suppressed() {
    UPDATES_SUPPRESSED_TOTAL.inc();
}

/// Update the memory gauges from the latest sample
#[inline]
pub fn update_memory(used_bytes: u64, usage_ratio: f64, tracked: usize) {
    MEMORY_USED_BYTES.set(used_bytes as f64);
    MEMORY_USAGE_RATIO.set(usage_ratio);
    TRACKED_REFERENCES.set(tracked as f64);
}

/// Record a memory warning
#[inline]
pub fn record_memory_warning(level: &str) {
    MEMORY_WARNINGS_TOTAL.with_label_values(&[level]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init();
        assert_eq!(UPDATE_QUEUE_DEPTH.get(), 0.0);
    }

    #[test]
    fn test_record_cache_lookup() {
        record_cache_lookup("stat_modifiers", true);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("progression_cache_lookups_total"));
    }

    #[test]
    fn test_gather_metrics() {
        init();
        record_tick(3, true, 0);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("progression_updates_executed_total"));
        assert!(metrics.contains("progression_frame_drops_total"));
    }
}
