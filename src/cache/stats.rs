//! Cache statistics snapshots
//!
//! Point-in-time views of per-category and aggregate cache health, consumed
//! by the facade's unified metrics and the text report.

use serde::Serialize;

/// Snapshot of one category's counters
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStatsSnapshot {
    /// Category name (stable snake_case label)
    pub category: &'static str,
    /// Current number of entries (expired-but-unread included)
    pub entries: usize,
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Lifetime hit rate (0.0 to 1.0)
    pub hit_rate: f64,
    /// Exponentially-weighted hit rate, weight 0.1 on the newest lookup
    pub ewma_hit_rate: f64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Entries removed by TTL expiry
    pub expirations: u64,
}

/// Aggregated view across every category
#[derive(Debug, Clone, Serialize)]
pub struct CacheStoreStats {
    /// Per-category snapshots, sorted by category name
    pub categories: Vec<CategoryStatsSnapshot>,
    /// Total live entries across categories
    pub total_entries: usize,
    /// Total hits across categories
    pub total_hits: u64,
    /// Total misses across categories
    pub total_misses: u64,
    /// Overall hit rate weighted by access count
    pub overall_hit_rate: f64,
}

impl CacheStoreStats {
    /// Build the aggregate from per-category snapshots
    pub fn aggregate(categories: Vec<CategoryStatsSnapshot>) -> Self {
        let total_entries = categories.iter().map(|c| c.entries).sum();
        let total_hits: u64 = categories.iter().map(|c| c.hits).sum();
        let total_misses: u64 = categories.iter().map(|c| c.misses).sum();
        let total_ops = total_hits + total_misses;

        CacheStoreStats {
            categories,
            total_entries,
            total_hits,
            total_misses,
            overall_hit_rate: if total_ops > 0 {
                total_hits as f64 / total_ops as f64
            } else {
                0.0
            },
        }
    }
}
