//! The performance facade: the single seam the rest of the game talks to
//!
//! Wraps the cache, pools, scheduler, and memory monitor behind one object.
//! Domain code asks it for derived data (computed or cached), enqueues UI
//! update requests, and reads unified health metrics. Eviction, pooling,
//! batching, and sampling all happen behind this boundary.
//!
//! The facade also owns the locks around the deliberately lock-free leaf
//! components, so a host runtime with real parallelism stays safe without
//! slowing the single-threaded hot path inside the leaves.

pub mod builder;

pub use builder::FacadeBuilder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheStore, CacheStoreStats};
use crate::host::HostEnvironment;
use crate::metrics;
use crate::monitor::{
    LeakCallback, MemoryMonitor, MonitorStatsSnapshot, WarningCallback,
};
use crate::pool::{
    ChangeResultRecord, ObjectPool, PoolStatsSnapshot, StatModifierRecord, UiBatchRecord,
};
use crate::scheduler::{
    RequestOutcome, SchedulerStats, TickReport, UpdateHandler, UpdateRequest, UpdateScheduler,
};
use crate::types::{CacheCategory, CharacterId, DerivedData, Rank, UpdateKind, UpdatePriority};

// ============================================================================
// Unified metrics
// ============================================================================

/// Pool snapshots for the three record types
#[derive(Debug, Clone, Serialize)]
pub struct PoolMetrics {
    /// Stat-modifier record pool
    pub stat_modifier: PoolStatsSnapshot,
    /// Change-result record pool
    pub change_result: PoolStatsSnapshot,
    /// UI-batch record pool
    pub ui_batch: PoolStatsSnapshot,
    /// Mean utilization across the three pools
    pub average_utilization: f64,
}

/// Unified point-in-time health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PerfMetrics {
    /// Cache statistics across categories
    pub cache: CacheStoreStats,
    /// Pool statistics
    pub pools: PoolMetrics,
    /// Scheduler statistics
    pub scheduler: SchedulerStats,
    /// Memory monitor statistics
    pub memory: MonitorStatsSnapshot,
    /// Compute closures run on cache miss
    pub computes: u64,
    /// Mean compute duration in microseconds
    pub average_compute_time_us: u64,
    /// Updates executed per second of facade uptime
    pub update_throughput_per_sec: f64,
    /// Facade uptime in seconds
    pub uptime_secs: u64,
}

/// What a forced cleanup pass accomplished
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Expired cache entries removed
    pub expired_entries_removed: usize,
    /// Pool objects released by shrink maintenance
    pub pool_objects_shrunk: usize,
    /// Zero-refcount tracked references dropped
    pub references_dropped: usize,
    /// Whether the host acted on the explicit reclaim request
    pub host_reclaimed: bool,
}

// ============================================================================
// Facade
// ============================================================================

/// Composition root for the performance layer
///
/// Build one per game session with [`FacadeBuilder`]; dispose it when the
/// session ends to release every tracked handle. Construction is explicit,
/// with no process-wide instance: callers receive a reference through
/// dependency injection rather than reaching into global state.
pub struct PerformanceFacade {
    pub(crate) cache: Arc<RwLock<CacheStore<DerivedData>>>,
    pub(crate) stat_pool: Arc<Mutex<ObjectPool<StatModifierRecord>>>,
    pub(crate) change_pool: Arc<Mutex<ObjectPool<ChangeResultRecord>>>,
    pub(crate) ui_pool: Arc<Mutex<ObjectPool<UiBatchRecord>>>,
    pub(crate) scheduler: Mutex<UpdateScheduler>,
    pub(crate) monitor: Arc<MemoryMonitor>,
    pub(crate) host: Arc<dyn HostEnvironment>,
    /// Total compute-on-miss time and count
    pub(crate) compute_tracker: Mutex<(Duration, u64)>,
    pub(crate) started_at: Instant,
    pub(crate) disposed: AtomicBool,
}

impl PerformanceFacade {
    // =========================================================================
    // Derived data
    // =========================================================================

    /// Look up cached derived data without computing on miss
    pub fn get_cached(&self, category: CacheCategory, key: &str) -> Option<DerivedData> {
        let result = self.cache.write().get(category, key);
        metrics::record_cache_lookup(category.as_str(), result.is_some());
        result
    }

    /// Look up derived data, running the compute closure on a miss.
    ///
    /// The closure must be deterministic for the key; compute time is
    /// measured and folded into the unified metrics.
    pub fn get_or_compute<F>(&self, category: CacheCategory, key: &str, compute: F) -> DerivedData
    where
        F: FnOnce() -> DerivedData,
    {
        if let Some(value) = self.cache.write().get(category, key) {
            metrics::record_cache_lookup(category.as_str(), true);
            return value;
        }
        metrics::record_cache_lookup(category.as_str(), false);

        let started = Instant::now();
        let value = compute();
        let elapsed = started.elapsed();
        metrics::record_compute(category.as_str(), elapsed.as_secs_f64());
        {
            let mut tracker = self.compute_tracker.lock();
            tracker.0 += elapsed;
            tracker.1 += 1;
        }

        self.cache
            .write()
            .insert(category, key.to_string(), value.clone());
        value
    }

    /// Store derived data directly
    pub fn insert(&self, category: CacheCategory, key: String, value: DerivedData) {
        self.cache.write().insert(category, key, value);
    }

    /// Drop every cached view of one (character, job, rank) across all
    /// categories. Call after a rank-up changes what the derived data means.
    pub fn invalidate_derived(&self, character: CharacterId, job: &str, rank: Rank) {
        let key = crate::types::derived_key(character, job, rank);
        let mut cache = self.cache.write();
        for category in CacheCategory::ALL {
            cache.remove(category, &key);
        }
    }

    // =========================================================================
    // Pooled records
    // =========================================================================

    /// Check out a stat-modifier record
    pub fn acquire_stat_record(&self) -> StatModifierRecord {
        self.stat_pool.lock().acquire()
    }

    /// Return a stat-modifier record to its pool
    pub fn release_stat_record(&self, record: StatModifierRecord) {
        self.stat_pool.lock().release(record);
    }

    /// Check out a change-result record
    pub fn acquire_change_record(&self) -> ChangeResultRecord {
        self.change_pool.lock().acquire()
    }

    /// Return a change-result record to its pool
    pub fn release_change_record(&self, record: ChangeResultRecord) {
        self.change_pool.lock().release(record);
    }

    /// Check out a UI-batch record
    pub fn acquire_ui_record(&self) -> UiBatchRecord {
        self.ui_pool.lock().acquire()
    }

    /// Return a UI-batch record to its pool
    pub fn release_ui_record(&self, record: UiBatchRecord) {
        self.ui_pool.lock().release(record);
    }

    // =========================================================================
    // UI updates
    // =========================================================================

    /// Register the handler dispatched for one update kind.
    ///
    /// Handlers run while the scheduler lock is held and must not call back
    /// into the facade's update API from inside their own invocation.
    pub fn register_update_handler(&self, kind: UpdateKind, handler: UpdateHandler) {
        self.scheduler.lock().register_handler(kind, handler);
    }

    /// Submit one update request
    pub fn request_update(
        &self,
        target: impl Into<String>,
        kind: UpdateKind,
        priority: UpdatePriority,
        payload: Value,
    ) -> RequestOutcome {
        let outcome = self.scheduler.lock().request(target, kind, priority, payload);
        if matches!(outcome, RequestOutcome::Dropped(_)) {
            metrics::record_suppressed();
        }
        outcome
    }

    /// Submit a pre-built request (for dependency chains)
    pub fn submit_update(&self, request: UpdateRequest) -> RequestOutcome {
        self.scheduler.lock().submit(request)
    }

    /// Submit several updates for one target in one call
    pub fn batch_update(
        &self,
        target: &str,
        updates: Vec<(UpdateKind, Value, UpdatePriority)>,
    ) -> Vec<RequestOutcome> {
        let mut scheduler = self.scheduler.lock();
        updates
            .into_iter()
            .map(|(kind, payload, priority)| scheduler.request(target, kind, priority, payload))
            .collect()
    }

    /// Update the visibility flag for a (target, kind) pair
    pub fn set_visibility(&self, target: &str, kind: UpdateKind, visible: bool) {
        self.scheduler.lock().set_visibility(target, kind, visible);
    }

    /// Run one scheduling pass; the host's per-frame callback drives this
    pub fn run_tick(&self) -> TickReport {
        let report = self.scheduler.lock().run_tick();
        metrics::record_tick(
            report.executed as u64,
            report.frame_dropped,
            report.deferred,
        );
        report
    }

    // =========================================================================
    // Memory monitoring
    // =========================================================================

    /// Start the monitor's timers; requires a tokio runtime
    pub fn start_monitoring(&self) -> crate::error::Result<()> {
        self.monitor.start().map_err(Into::into)
    }

    /// Stop the monitor's timers; safe to call repeatedly
    pub fn stop_monitoring(&self) {
        self.monitor.stop();
    }

    /// Register a memory warning callback
    pub fn on_warning(&self, callback: WarningCallback) {
        self.monitor.on_warning(callback);
    }

    /// Register a leak-report callback
    pub fn on_leak_detected(&self, callback: LeakCallback) {
        self.monitor.on_leak_detected(callback);
    }

    /// Register a long-lived object for leak tracking; returns its id
    pub fn track_reference(&self, type_tag: impl Into<String>, approx_size_bytes: usize) -> u64 {
        self.monitor.track_reference(type_tag, approx_size_bytes)
    }

    /// Record an access on a tracked reference
    pub fn touch_reference(&self, id: u64) {
        self.monitor.touch_reference(id);
    }

    /// Drop one reference; the entry disappears at count zero
    pub fn release_reference(&self, id: u64) -> bool {
        self.monitor.release_reference(id)
    }

    /// Remove a tracked reference regardless of its count
    pub fn untrack_reference(&self, id: u64) {
        self.monitor.untrack_reference(id);
    }

    /// Direct access to the monitor, for wiring beyond the facade surface
    pub fn monitor(&self) -> &Arc<MemoryMonitor> {
        &self.monitor
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Unified point-in-time metrics across all four components.
    ///
    /// Also refreshes the Prometheus pool and memory gauges.
    pub fn metrics(&self) -> PerfMetrics {
        let cache = self.cache.read().stats();

        let stat_modifier = self.stat_pool.lock().stats();
        let change_result = self.change_pool.lock().stats();
        let ui_batch = self.ui_pool.lock().stats();
        let average_utilization = (stat_modifier.utilization
            + change_result.utilization
            + ui_batch.utilization)
            / 3.0;

        metrics::update_pool_utilization("stat_modifier", stat_modifier.utilization);
        metrics::update_pool_utilization("change_result", change_result.utilization);
        metrics::update_pool_utilization("ui_batch", ui_batch.utilization);

        let scheduler = self.scheduler.lock().stats();
        let memory = self.monitor.stats();
        metrics::update_memory(
            memory.used_bytes,
            memory.usage_percentage,
            memory.tracked_references,
        );

        let (compute_total, computes) = *self.compute_tracker.lock();
        let average_compute_time_us = if computes > 0 {
            (compute_total.as_micros() / computes as u128) as u64
        } else {
            0
        };

        let uptime = self.started_at.elapsed();
        let update_throughput_per_sec = if uptime.as_secs_f64() > 0.0 {
            scheduler.executed as f64 / uptime.as_secs_f64()
        } else {
            0.0
        };

        PerfMetrics {
            cache,
            pools: PoolMetrics {
                stat_modifier,
                change_result,
                ui_batch,
                average_utilization,
            },
            scheduler,
            memory,
            computes,
            average_compute_time_us,
            update_throughput_per_sec,
            uptime_secs: uptime.as_secs(),
        }
    }

    /// Human-readable summary of the unified metrics
    pub fn generate_report(&self) -> String {
        let m = self.metrics();
        let mut report = String::new();

        report.push_str("=== Progression Performance Report ===\n");
        report.push_str(&format!(
            "Generated: {}\n",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        report.push_str(&format!("Uptime: {}s\n\n", m.uptime_secs));

        report.push_str("-- Cache --\n");
        report.push_str(&format!(
            "Overall hit rate: {:.1}% ({} hits / {} misses, {} entries)\n",
            m.cache.overall_hit_rate * 100.0,
            m.cache.total_hits,
            m.cache.total_misses,
            m.cache.total_entries
        ));
        for cat in &m.cache.categories {
            report.push_str(&format!(
                "  {:<22} {:>5} entries, hit rate {:.1}%, ewma {:.2}, {} evicted, {} expired\n",
                cat.category,
                cat.entries,
                cat.hit_rate * 100.0,
                cat.ewma_hit_rate,
                cat.evictions,
                cat.expirations
            ));
        }
        report.push_str(&format!(
            "Average compute time: {}us across {} computes\n\n",
            m.average_compute_time_us, m.computes
        ));

        report.push_str("-- Pools --\n");
        for (name, pool) in [
            ("stat_modifier", &m.pools.stat_modifier),
            ("change_result", &m.pools.change_result),
            ("ui_batch", &m.pools.ui_batch),
        ] {
            report.push_str(&format!(
                "  {:<22} {:>4} free, utilization {:.2}, {} created, {} reused, {} dropped\n",
                name, pool.free, pool.utilization, pool.created, pool.reused, pool.dropped
            ));
        }
        report.push_str(&format!(
            "Average utilization: {:.2}\n\n",
            m.pools.average_utilization
        ));

        report.push_str("-- Scheduler --\n");
        report.push_str(&format!(
            "Executed: {} ({} immediate), throughput {:.1}/s\n",
            m.scheduler.executed, m.scheduler.immediate_executed, m.update_throughput_per_sec
        ));
        report.push_str(&format!(
            "Merged: {}, suppressed: {}, overflow-dropped: {}, failed: {}\n",
            m.scheduler.merged,
            m.scheduler.suppressed,
            m.scheduler.dropped_overflow,
            m.scheduler.failed
        ));
        report.push_str(&format!(
            "Ticks: {}, batches: {}, frame drops: {}, queued now: {}\n\n",
            m.scheduler.ticks,
            m.scheduler.batches_built,
            m.scheduler.frame_drops,
            m.scheduler.queue_len
        ));

        report.push_str("-- Memory --\n");
        report.push_str(&format!(
            "Usage: {:.1}% ({} bytes), trend: {}\n",
            m.memory.usage_percentage * 100.0,
            m.memory.used_bytes,
            m.memory.trend
        ));
        report.push_str(&format!(
            "Tracked references: {}, warnings: {}, leak reports: {}, cleanups: {}, reclaims: {}\n",
            m.memory.tracked_references,
            m.memory.warnings_emitted,
            m.memory.leaks_reported,
            m.memory.cleanups_run,
            m.memory.reclaim_events
        ));

        report
    }

    /// Run an aggressive cleanup pass right now, regardless of memory
    /// pressure: sweep expired cache entries, shrink over-grown pools, drop
    /// zero-refcount tracked references, and ask the host for a reclaim.
    pub fn force_cleanup(&self) -> CleanupReport {
        let expired_entries_removed = self.cache.write().cleanup_expired();
        let pool_objects_shrunk = self.stat_pool.lock().maintenance()
            + self.change_pool.lock().maintenance()
            + self.ui_pool.lock().maintenance();
        let references_dropped = self.monitor.drop_zero_references();
        let host_reclaimed = self.host.request_reclaim();

        info!(
            expired_entries_removed,
            pool_objects_shrunk, references_dropped, host_reclaimed, "Forced cleanup"
        );

        CleanupReport {
            expired_entries_removed,
            pool_objects_shrunk,
            references_dropped,
            host_reclaimed,
        }
    }

    /// Tear down every component: stop the monitor's timers and clear all
    /// caches, pools, queues, and registries.
    ///
    /// Each step is isolated so one component's teardown can never prevent
    /// the others from releasing their resources. Safe to call repeatedly.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.monitor.dispose();
        self.scheduler.lock().clear();
        self.cache.write().clear(None);
        self.stat_pool.lock().clear();
        self.change_pool.lock().clear();
        self.ui_pool.lock().clear();

        info!("Performance facade disposed");
    }

    /// Whether `dispose` has run
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for PerformanceFacade {
    fn drop(&mut self) {
        self.dispose();
    }
}
