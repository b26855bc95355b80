//! Memory usage trend and growth heuristics
//!
//! Pure functions over the sample history; the monitor feeds them from its
//! timer and leak-analysis passes.

use serde::Serialize;
use std::fmt;

/// Number of trailing samples examined by the trend label
const TREND_WINDOW: usize = 3;

/// Threshold on the mean delta, as a fraction of the window baseline
const TREND_THRESHOLD: f64 = 0.05;

/// Number of trailing samples examined by the growth heuristic
pub const GROWTH_WINDOW: usize = 10;

/// Cumulative growth (fraction of the window's first sample) that counts as
/// continuous memory growth
pub const GROWTH_REPORT_THRESHOLD: f64 = 0.20;

/// Growth fraction past which a continuous-growth report escalates
pub const GROWTH_CRITICAL_THRESHOLD: f64 = 0.50;

/// One memory measurement
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemorySample {
    /// Wall-clock timestamp in milliseconds since the epoch
    pub timestamp_ms: i64,
    /// Bytes used by the process at sampling time
    pub used_bytes: u64,
    /// Total bytes available at sampling time
    pub total_bytes: u64,
    /// Tracked references registered at sampling time
    pub tracked_objects: usize,
    /// Successful explicit reclamations so far
    pub reclaim_events: u64,
}

impl MemorySample {
    /// Used fraction of total, 0.0 when total is unknown
    pub fn usage_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Direction of recent memory usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryTrend {
    /// Mean delta above +5% of the window baseline
    Increasing,
    /// Mean delta below -5% of the window baseline
    Decreasing,
    /// Within the threshold band, or not enough samples
    Stable,
}

impl MemoryTrend {
    /// Stable snake_case label for metrics and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryTrend::Increasing => "increasing",
            MemoryTrend::Decreasing => "decreasing",
            MemoryTrend::Stable => "stable",
        }
    }
}

impl fmt::Display for MemoryTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label the trend of the last three samples.
///
/// The mean of the consecutive deltas is compared against ±5% of the window's
/// first sample; fewer than three samples is always `Stable`.
pub fn compute_trend(samples: &[MemorySample]) -> MemoryTrend {
    if samples.len() < TREND_WINDOW {
        return MemoryTrend::Stable;
    }

    let window = &samples[samples.len() - TREND_WINDOW..];
    let mut delta_sum = 0.0;
    for pair in window.windows(2) {
        delta_sum += pair[1].used_bytes as f64 - pair[0].used_bytes as f64;
    }
    let mean_delta = delta_sum / (TREND_WINDOW - 1) as f64;
    let threshold = window[0].used_bytes as f64 * TREND_THRESHOLD;

    if mean_delta > threshold {
        MemoryTrend::Increasing
    } else if mean_delta < -threshold {
        MemoryTrend::Decreasing
    } else {
        MemoryTrend::Stable
    }
}

/// Detect sustained memory growth over the last [`GROWTH_WINDOW`] samples.
///
/// Fires only when every consecutive pair is non-decreasing and the
/// cumulative rise exceeds [`GROWTH_REPORT_THRESHOLD`] of the window's first
/// sample. Returns the growth ratio when detected.
pub fn detect_continuous_growth(samples: &[MemorySample]) -> Option<f64> {
    if samples.len() < GROWTH_WINDOW {
        return None;
    }

    let window = &samples[samples.len() - GROWTH_WINDOW..];
    for pair in window.windows(2) {
        if pair[1].used_bytes < pair[0].used_bytes {
            return None;
        }
    }

    let first = window[0].used_bytes;
    if first == 0 {
        return None;
    }
    let last = window[GROWTH_WINDOW - 1].used_bytes;
    let growth = (last - first) as f64 / first as f64;

    if growth > GROWTH_REPORT_THRESHOLD {
        Some(growth)
    } else {
        None
    }
}
