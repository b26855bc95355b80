//! Memory monitoring and leak detection
//!
//! Samples process memory on a fixed interval, tracks registered long-lived
//! references, and reports two leak signals: references that stay referenced
//! far past their expected lifetime, and sustained non-decreasing memory
//! growth. Threshold crossings fire warning callbacks and, when auto-cleanup
//! is enabled, a facade-wired cleanup hook.
//!
//! # Timers
//!
//! `start` spawns two independent tokio interval tasks under one broadcast
//! shutdown channel: metrics collection at `sampling_interval` and, when
//! leak detection is enabled, a leak-analysis pass at twice that interval.
//! Timers are fire-and-forget: a slow callback delays but never corrupts
//! later samples, since each pass reads current state fresh.

pub mod tracker;
pub mod trend;

pub use tracker::{ReferenceTracker, TrackedReference, TrackerSnapshot};
pub use trend::{compute_trend, detect_continuous_growth, MemorySample, MemoryTrend};

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, MonitorError};
use crate::host::HostEnvironment;

use trend::{GROWTH_CRITICAL_THRESHOLD, GROWTH_WINDOW};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the memory monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between memory samples (default: 5 s)
    pub sampling_interval: Duration,

    /// Usage fraction that fires warning callbacks with light cleanup
    /// (default: 0.8)
    pub warning_threshold: f64,

    /// Usage fraction that fires warning callbacks with aggressive cleanup
    /// (default: 0.95)
    pub critical_threshold: f64,

    /// Samples kept in history (default: 100)
    pub history_cap: usize,

    /// Run the leak-analysis timer (default: true)
    pub enable_leak_detection: bool,

    /// Run the cleanup hook on threshold crossings (default: true)
    pub auto_cleanup: bool,

    /// Age past which a still-referenced tracked reference is reported
    /// (default: 10 minutes)
    pub stale_reference_age: Duration,

    /// Age past which such a report escalates to high severity
    /// (default: 30 minutes)
    pub stale_reference_escalation: Duration,

    /// Idle time past which light cleanup drops a tracked reference
    /// (default: 5 minutes)
    pub idle_reference_age: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(5),
            warning_threshold: 0.8,
            critical_threshold: 0.95,
            history_cap: 100,
            enable_leak_detection: true,
            auto_cleanup: true,
            stale_reference_age: Duration::from_secs(600),
            stale_reference_escalation: Duration::from_secs(1800),
            idle_reference_age: Duration::from_secs(300),
        }
    }
}

impl MonitorConfig {
    /// Set the sampling interval
    pub fn with_sampling_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = interval;
        self
    }

    /// Set the warning and critical usage thresholds
    pub fn with_thresholds(mut self, warning: f64, critical: f64) -> Self {
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self
    }

    /// Disable the leak-analysis timer
    pub fn without_leak_detection(mut self) -> Self {
        self.enable_leak_detection = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_interval.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "monitor.sampling_interval",
            });
        }
        if self.history_cap == 0 {
            return Err(ConfigError::NonPositive {
                field: "monitor.history_cap",
            });
        }
        for (field, value) in [
            ("monitor.warning_threshold", self.warning_threshold),
            ("monitor.critical_threshold", self.critical_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || value == 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: value.to_string(),
                    min: "0.0 exclusive".to_string(),
                    max: "1.0".to_string(),
                });
            }
        }
        if self.warning_threshold > self.critical_threshold {
            return Err(ConfigError::Inconsistent {
                message: format!(
                    "monitor.warning_threshold {} exceeds monitor.critical_threshold {}",
                    self.warning_threshold, self.critical_threshold
                ),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Reports and callbacks
// ============================================================================

/// Severity attached to a leak report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Actively degrading the session
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Which warning threshold was crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningLevel {
    /// Above the warning threshold
    Warning,
    /// Above the critical threshold
    Critical,
}

/// Delivered to warning callbacks on a threshold crossing
#[derive(Debug, Clone, Serialize)]
pub struct MemoryWarning {
    /// Which threshold was crossed
    pub level: WarningLevel,
    /// Usage fraction at sampling time
    pub usage_percentage: f64,
    /// Bytes used at sampling time
    pub used_bytes: u64,
    /// Total bytes at sampling time
    pub total_bytes: u64,
    /// Wall-clock timestamp in milliseconds
    pub timestamp_ms: i64,
}

/// What a leak report is about
#[derive(Debug, Clone, Serialize)]
pub enum LeakKind {
    /// A tracked reference has stayed referenced past its expected lifetime
    LongLivedReference {
        /// Registry id of the reference
        id: u64,
        /// Caller-supplied type tag
        type_tag: String,
        /// Age in seconds at analysis time
        age_secs: u64,
    },
    /// Memory has risen monotonically across the analysis window
    ContinuousMemoryGrowth {
        /// Cumulative growth as a fraction of the window's first sample
        growth_ratio: f64,
    },
}

/// A diagnostic leak report; never triggers corrective action by itself
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    /// What was detected
    pub kind: LeakKind,
    /// How bad it looks
    pub severity: Severity,
    /// Wall-clock timestamp in milliseconds
    pub detected_at_ms: i64,
}

/// How hard a cleanup pass should work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupLevel {
    /// Drop idle tracked references only
    Light,
    /// Sweep expired cache entries, zero-refcount references, and ask the
    /// host for an explicit reclaim
    Aggressive,
}

/// Callback invoked on a threshold crossing
pub type WarningCallback = Box<dyn Fn(&MemoryWarning) + Send + Sync>;

/// Callback invoked for each leak report
pub type LeakCallback = Box<dyn Fn(&LeakReport) + Send + Sync>;

/// Hook invoked by auto-cleanup; the facade wires this to its cache sweep
/// and pool maintenance
pub type CleanupHook = Box<dyn Fn(CleanupLevel) + Send + Sync>;

/// Lifecycle state of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStatus {
    /// Timers not running
    Stopped,
    /// Timers running
    Running,
}

/// Point-in-time monitor summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatsSnapshot {
    /// Samples currently in history
    pub samples: usize,
    /// Usage fraction of the latest sample (0.0 without one)
    pub usage_percentage: f64,
    /// Bytes used per the latest sample
    pub used_bytes: u64,
    /// Current trend label
    pub trend: &'static str,
    /// Tracked references registered
    pub tracked_references: usize,
    /// Warnings emitted so far
    pub warnings_emitted: u64,
    /// Leak reports emitted so far
    pub leaks_reported: u64,
    /// Cleanup passes run so far
    pub cleanups_run: u64,
    /// Successful explicit reclamations so far
    pub reclaim_events: u64,
}

// ============================================================================
// Monitor
// ============================================================================

/// Periodic memory sampler and leak detector
///
/// Construct with [`MemoryMonitor::new`], register callbacks, then call
/// [`start`](MemoryMonitor::start) from within a tokio runtime. All state is
/// internally synchronized because the timer tasks outlive individual calls.
///
/// Callbacks run synchronously on the timer task and must not register
/// further callbacks from inside their own invocation.
pub struct MemoryMonitor {
    config: MonitorConfig,
    host: Arc<dyn HostEnvironment>,

    history: Mutex<VecDeque<MemorySample>>,
    tracker: Mutex<ReferenceTracker>,

    warning_callbacks: Mutex<Vec<WarningCallback>>,
    leak_callbacks: Mutex<Vec<LeakCallback>>,
    cleanup_hook: Mutex<Option<CleanupHook>>,

    status: RwLock<MonitorStatus>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,

    warnings_emitted: AtomicU64,
    leaks_reported: AtomicU64,
    cleanups_run: AtomicU64,
    reclaim_events: AtomicU64,
}

impl MemoryMonitor {
    /// Create a monitor reading memory through `host`
    pub fn new(config: MonitorConfig, host: Arc<dyn HostEnvironment>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            config,
            host,
            history: Mutex::new(VecDeque::new()),
            tracker: Mutex::new(ReferenceTracker::new()),
            warning_callbacks: Mutex::new(Vec::new()),
            leak_callbacks: Mutex::new(Vec::new()),
            cleanup_hook: Mutex::new(None),
            status: RwLock::new(MonitorStatus::Stopped),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            warnings_emitted: AtomicU64::new(0),
            leaks_reported: AtomicU64::new(0),
            cleanups_run: AtomicU64::new(0),
            reclaim_events: AtomicU64::new(0),
        })
    }

    /// Register a warning callback
    pub fn on_warning(&self, callback: WarningCallback) {
        self.warning_callbacks.lock().push(callback);
    }

    /// Register a leak-report callback
    pub fn on_leak_detected(&self, callback: LeakCallback) {
        self.leak_callbacks.lock().push(callback);
    }

    /// Install the cleanup hook, replacing any previous one
    pub fn set_cleanup_hook(&self, hook: CleanupHook) {
        *self.cleanup_hook.lock() = Some(hook);
    }

    /// Start both timers. Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), MonitorError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| MonitorError::NoRuntime(e.to_string()))?;

        {
            let mut status = self.status.write();
            if *status == MonitorStatus::Running {
                return Err(MonitorError::AlreadyRunning);
            }
            *status = MonitorStatus::Running;
        }

        let mut tasks = self.tasks.lock();

        // Metrics collection timer
        {
            let monitor = Arc::clone(self);
            let mut shutdown = self.shutdown_tx.subscribe();
            let interval = self.config.sampling_interval;
            tasks.push(handle.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        result = shutdown.recv() => {
                            match result {
                                Ok(()) | Err(broadcast::error::RecvError::Closed) => break,
                                Err(broadcast::error::RecvError::Lagged(n)) => {
                                    debug!(missed = n, "Monitor sampler receiver lagged");
                                }
                            }
                        }
                        _ = ticker.tick() => {
                            monitor.collect_now();
                        }
                    }
                }
                debug!("Metrics collection timer stopped");
            }));
        }

        // Leak analysis timer, at twice the sampling interval
        if self.config.enable_leak_detection {
            let monitor = Arc::clone(self);
            let mut shutdown = self.shutdown_tx.subscribe();
            let interval = self.config.sampling_interval * 2;
            tasks.push(handle.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        result = shutdown.recv() => {
                            match result {
                                Ok(()) | Err(broadcast::error::RecvError::Closed) => break,
                                Err(broadcast::error::RecvError::Lagged(n)) => {
                                    debug!(missed = n, "Leak analysis receiver lagged");
                                }
                            }
                        }
                        _ = ticker.tick() => {
                            monitor.analyze_leaks();
                        }
                    }
                }
                debug!("Leak analysis timer stopped");
            }));
        }

        info!(
            sampling_interval_ms = self.config.sampling_interval.as_millis() as u64,
            leak_detection = self.config.enable_leak_detection,
            "Memory monitor started"
        );
        Ok(())
    }

    /// Cancel both timers. Safe to call repeatedly or when never started.
    pub fn stop(&self) {
        {
            let mut status = self.status.write();
            if *status == MonitorStatus::Stopped {
                return;
            }
            *status = MonitorStatus::Stopped;
        }

        let _ = self.shutdown_tx.send(());
        // Timers are fire-and-forget between ticks; aborting an exiting task
        // loses no state
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("Memory monitor stopped");
    }

    /// Stop the timers and clear history, registry, and callbacks.
    /// Safe to call repeatedly.
    pub fn dispose(&self) {
        self.stop();
        self.history.lock().clear();
        self.tracker.lock().clear();
        self.warning_callbacks.lock().clear();
        self.leak_callbacks.lock().clear();
        *self.cleanup_hook.lock() = None;
    }

    /// Current lifecycle state
    pub fn status(&self) -> MonitorStatus {
        *self.status.read()
    }

    /// Take one sample right now: read the host, record, and run threshold
    /// handling. Also the per-tick body of the metrics timer.
    pub fn collect_now(&self) -> MemorySample {
        let reading = self.host.memory_usage().unwrap_or_default();
        let sample = MemorySample {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            used_bytes: reading.used_bytes,
            total_bytes: reading.total_bytes,
            tracked_objects: self.tracker.lock().len(),
            reclaim_events: self.reclaim_events.load(Ordering::Relaxed),
        };

        self.record_sample(sample);
        self.handle_thresholds(&sample);
        sample
    }

    /// Append an externally-produced sample to the history, trimming to the
    /// configured cap. Hosts that push their own readings use this directly.
    pub fn record_sample(&self, sample: MemorySample) {
        let mut history = self.history.lock();
        history.push_back(sample);
        while history.len() > self.config.history_cap {
            history.pop_front();
        }
    }

    /// Trend label over the current history
    pub fn trend(&self) -> MemoryTrend {
        let history = self.history.lock();
        let samples: Vec<MemorySample> = history.iter().copied().collect();
        compute_trend(&samples)
    }

    /// Run one leak-analysis pass and deliver any reports to the registered
    /// callbacks. Also the per-tick body of the leak timer.
    pub fn analyze_leaks(&self) -> Vec<LeakReport> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut reports = Vec::new();

        // Long-lived references still referenced past their expected lifetime
        {
            let tracker = self.tracker.lock();
            for r in tracker.stale_refs(self.config.stale_reference_age) {
                let severity = if r.age() > self.config.stale_reference_escalation {
                    Severity::High
                } else {
                    Severity::Medium
                };
                reports.push(LeakReport {
                    kind: LeakKind::LongLivedReference {
                        id: r.id,
                        type_tag: r.type_tag.clone(),
                        age_secs: r.age().as_secs(),
                    },
                    severity,
                    detected_at_ms: now_ms,
                });
            }
        }

        // Sustained non-decreasing growth across the analysis window
        {
            let history = self.history.lock();
            if history.len() >= GROWTH_WINDOW {
                let samples: Vec<MemorySample> = history.iter().copied().collect();
                if let Some(growth_ratio) = detect_continuous_growth(&samples) {
                    let severity = if growth_ratio > GROWTH_CRITICAL_THRESHOLD {
                        Severity::Critical
                    } else {
                        Severity::High
                    };
                    reports.push(LeakReport {
                        kind: LeakKind::ContinuousMemoryGrowth { growth_ratio },
                        severity,
                        detected_at_ms: now_ms,
                    });
                }
            }
        }

        if !reports.is_empty() {
            self.leaks_reported
                .fetch_add(reports.len() as u64, Ordering::Relaxed);
            warn!(reports = reports.len(), "Leak analysis produced reports");
            let callbacks = self.leak_callbacks.lock();
            for report in &reports {
                for callback in callbacks.iter() {
                    callback(report);
                }
            }
        }

        reports
    }

    /// Register a long-lived object for leak tracking; returns its id
    pub fn track_reference(&self, type_tag: impl Into<String>, approx_size_bytes: usize) -> u64 {
        self.tracker.lock().track(type_tag, approx_size_bytes)
    }

    /// Record an access on a tracked reference
    pub fn touch_reference(&self, id: u64) {
        self.tracker.lock().touch(id);
    }

    /// Drop one reference; the entry disappears when its count reaches zero
    pub fn release_reference(&self, id: u64) -> bool {
        self.tracker.lock().release(id)
    }

    /// Remove a tracked reference regardless of its count
    pub fn untrack_reference(&self, id: u64) {
        self.tracker.lock().untrack(id);
    }

    /// Run a cleanup pass at the given level, regardless of thresholds
    pub fn force_cleanup(&self, level: CleanupLevel) {
        self.run_cleanup(level);
    }

    /// Drop every tracked reference whose count is zero.
    /// Returns the number removed.
    pub fn drop_zero_references(&self) -> usize {
        self.tracker.lock().drop_zero_refs()
    }

    /// Point-in-time summary for the facade's unified metrics
    pub fn stats(&self) -> MonitorStatsSnapshot {
        let history = self.history.lock();
        let latest = history.back().copied();
        let samples: Vec<MemorySample> = history.iter().copied().collect();
        drop(history);

        MonitorStatsSnapshot {
            samples: samples.len(),
            usage_percentage: latest.map(|s| s.usage_percentage()).unwrap_or(0.0),
            used_bytes: latest.map(|s| s.used_bytes).unwrap_or(0),
            trend: compute_trend(&samples).as_str(),
            tracked_references: self.tracker.lock().len(),
            warnings_emitted: self.warnings_emitted.load(Ordering::Relaxed),
            leaks_reported: self.leaks_reported.load(Ordering::Relaxed),
            cleanups_run: self.cleanups_run.load(Ordering::Relaxed),
            reclaim_events: self.reclaim_events.load(Ordering::Relaxed),
        }
    }

    fn handle_thresholds(&self, sample: &MemorySample) {
        let usage = sample.usage_percentage();

        let level = if usage >= self.config.critical_threshold {
            Some(WarningLevel::Critical)
        } else if usage >= self.config.warning_threshold {
            Some(WarningLevel::Warning)
        } else {
            None
        };

        let Some(level) = level else { return };

        let warning = MemoryWarning {
            level,
            usage_percentage: usage,
            used_bytes: sample.used_bytes,
            total_bytes: sample.total_bytes,
            timestamp_ms: sample.timestamp_ms,
        };
        warn!(
            usage = format!("{:.1}%", usage * 100.0),
            level = ?level,
            "Memory threshold crossed"
        );

        self.warnings_emitted.fetch_add(1, Ordering::Relaxed);
        {
            let callbacks = self.warning_callbacks.lock();
            for callback in callbacks.iter() {
                callback(&warning);
            }
        }

        if self.config.auto_cleanup {
            let cleanup_level = match level {
                WarningLevel::Critical => CleanupLevel::Aggressive,
                WarningLevel::Warning => CleanupLevel::Light,
            };
            self.run_cleanup(cleanup_level);
        }
    }

    fn run_cleanup(&self, level: CleanupLevel) {
        self.cleanups_run.fetch_add(1, Ordering::Relaxed);

        match level {
            CleanupLevel::Light => {
                let dropped = self
                    .tracker
                    .lock()
                    .drop_idle(self.config.idle_reference_age);
                debug!(dropped, "Light cleanup pass");
            },
            CleanupLevel::Aggressive => {
                let dropped = self.tracker.lock().drop_zero_refs();
                let reclaimed = self.host.request_reclaim();
                if reclaimed {
                    self.reclaim_events.fetch_add(1, Ordering::Relaxed);
                }
                debug!(dropped, reclaimed, "Aggressive cleanup pass");
            },
        }

        if let Some(hook) = self.cleanup_hook.lock().as_ref() {
            hook(level);
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryReading, NoopHost};

    /// Host returning a configurable reading
    struct FakeHost {
        reading: Mutex<MemoryReading>,
        reclaims: AtomicU64,
    }

    impl FakeHost {
        fn new(used: u64, total: u64) -> Arc<Self> {
            Arc::new(Self {
                reading: Mutex::new(MemoryReading {
                    used_bytes: used,
                    total_bytes: total,
                }),
                reclaims: AtomicU64::new(0),
            })
        }
    }

    impl HostEnvironment for FakeHost {
        fn memory_usage(&self) -> Option<MemoryReading> {
            Some(*self.reading.lock())
        }

        fn request_reclaim(&self) -> bool {
            self.reclaims.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn rising_sample(used: u64) -> MemorySample {
        MemorySample {
            used_bytes: used,
            total_bytes: 1 << 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(MonitorConfig::default().validate().is_ok());
        assert!(MonitorConfig::default()
            .with_thresholds(0.9, 0.8)
            .validate()
            .is_err());
        assert!(MonitorConfig::default()
            .with_thresholds(0.0, 0.9)
            .validate()
            .is_err());
        assert!(MonitorConfig::default()
            .with_sampling_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_degraded_host_reports_zero_usage() {
        let monitor = MemoryMonitor::new(MonitorConfig::default(), Arc::new(NoopHost)).unwrap();
        let sample = monitor.collect_now();
        assert_eq!(sample.used_bytes, 0);
        assert_eq!(sample.usage_percentage(), 0.0);
        assert_eq!(monitor.stats().warnings_emitted, 0);
    }

    #[test]
    fn test_history_trimmed_to_cap() {
        let mut config = MonitorConfig::default();
        config.history_cap = 5;
        let monitor = MemoryMonitor::new(config, Arc::new(NoopHost)).unwrap();
        for i in 0..20 {
            monitor.record_sample(rising_sample(i));
        }
        assert_eq!(monitor.stats().samples, 5);
    }

    #[test]
    fn test_warning_threshold_fires_callback_and_light_cleanup() {
        let host = FakeHost::new(850, 1000);
        let monitor = MemoryMonitor::new(MonitorConfig::default(), host.clone()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            monitor.on_warning(Box::new(move |w| seen.lock().push(w.level)));
        }
        let cleanups = Arc::new(Mutex::new(Vec::new()));
        {
            let cleanups = cleanups.clone();
            monitor.set_cleanup_hook(Box::new(move |level| cleanups.lock().push(level)));
        }

        monitor.collect_now();

        assert_eq!(*seen.lock(), vec![WarningLevel::Warning]);
        assert_eq!(*cleanups.lock(), vec![CleanupLevel::Light]);
        // Light cleanup never asks the host for a reclaim
        assert_eq!(host.reclaims.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_critical_threshold_runs_aggressive_cleanup() {
        let host = FakeHost::new(990, 1000);
        let monitor = MemoryMonitor::new(MonitorConfig::default(), host.clone()).unwrap();

        let cleanups = Arc::new(Mutex::new(Vec::new()));
        {
            let cleanups = cleanups.clone();
            monitor.set_cleanup_hook(Box::new(move |level| cleanups.lock().push(level)));
        }

        monitor.collect_now();

        assert_eq!(*cleanups.lock(), vec![CleanupLevel::Aggressive]);
        assert_eq!(host.reclaims.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.stats().reclaim_events, 1);
    }

    #[test]
    fn test_growth_leak_reported_high() {
        let monitor = MemoryMonitor::new(MonitorConfig::default(), Arc::new(NoopHost)).unwrap();
        // 10 strictly rising samples totaling a 25% rise
        for i in 0..10 {
            monitor.record_sample(rising_sample(1000 + i * 28));
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            monitor.on_leak_detected(Box::new(move |r| seen.lock().push(r.severity)));
        }

        let reports = monitor.analyze_leaks();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            reports[0].kind,
            LeakKind::ContinuousMemoryGrowth { .. }
        ));
        assert_eq!(reports[0].severity, Severity::High);
        assert_eq!(*seen.lock(), vec![Severity::High]);
    }

    #[test]
    fn test_flat_samples_report_nothing() {
        let monitor = MemoryMonitor::new(MonitorConfig::default(), Arc::new(NoopHost)).unwrap();
        for _ in 0..10 {
            monitor.record_sample(rising_sample(1000));
        }
        assert!(monitor.analyze_leaks().is_empty());
    }

    #[test]
    fn test_growth_past_fifty_percent_is_critical() {
        let monitor = MemoryMonitor::new(MonitorConfig::default(), Arc::new(NoopHost)).unwrap();
        for i in 0..10 {
            monitor.record_sample(rising_sample(1000 + i * 100));
        }
        let reports = monitor.analyze_leaks();
        assert_eq!(reports[0].severity, Severity::Critical);
    }

    #[test]
    fn test_stale_reference_reported_and_escalated() {
        let mut config = MonitorConfig::default();
        config.stale_reference_age = Duration::from_millis(10);
        config.stale_reference_escalation = Duration::from_millis(40);
        let monitor = MemoryMonitor::new(config, Arc::new(NoopHost)).unwrap();

        let id = monitor.track_reference("job_state", 512);
        std::thread::sleep(Duration::from_millis(20));

        let reports = monitor.analyze_leaks();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].severity, Severity::Medium);

        std::thread::sleep(Duration::from_millis(30));
        let reports = monitor.analyze_leaks();
        assert_eq!(reports[0].severity, Severity::High);

        // Released references stop being reported
        monitor.release_reference(id);
        assert!(monitor.analyze_leaks().is_empty());
    }

    #[tokio::test]
    async fn test_timer_lifecycle() {
        let config = MonitorConfig::default()
            .with_sampling_interval(Duration::from_millis(10));
        let monitor = Arc::new(MemoryMonitor::new(config, FakeHost::new(100, 1000)).unwrap());

        monitor.start().unwrap();
        assert_eq!(monitor.status(), MonitorStatus::Running);
        // A second start while running is rejected, not a panic
        assert!(matches!(
            monitor.start(),
            Err(MonitorError::AlreadyRunning)
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.stats().samples > 0);

        monitor.stop();
        monitor.stop(); // idempotent
        assert_eq!(monitor.status(), MonitorStatus::Stopped);

        monitor.dispose();
        monitor.dispose(); // idempotent
        assert_eq!(monitor.stats().samples, 0);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let config = MonitorConfig::default()
            .with_sampling_interval(Duration::from_millis(10));
        let monitor = Arc::new(MemoryMonitor::new(config, FakeHost::new(100, 1000)).unwrap());

        monitor.start().unwrap();
        monitor.stop();
        monitor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(monitor.stats().samples > 0);
        monitor.stop();
    }
}
