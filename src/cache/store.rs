//! Category cache store with TTL expiry and batched LRU eviction

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ConfigError;
use crate::types::CacheCategory;

use super::stats::{CacheStoreStats, CategoryStatsSnapshot};

/// Fraction of a full category evicted in one batch.
///
/// Evicting a quarter at a time amortizes the sort cost instead of paying an
/// O(n log n) scan on every insert at capacity.
const EVICTION_FRACTION: f64 = 0.25;

/// Weight of the newest observation in the hit-rate moving average
const EWMA_ALPHA: f64 = 0.1;

/// Configuration for one cache category
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live entries per category (default: 500)
    pub max_entries: usize,

    /// Maximum entry age before it is treated as stale (default: 5 minutes)
    pub ttl: Duration,

    /// Evict by last access time; when disabled, falls back to insertion age
    /// so the size cap still holds (default: true)
    pub enable_lru: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(300),
            enable_lru: true,
        }
    }
}

impl CacheConfig {
    /// Set the per-category entry cap
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the entry time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Disable access-order eviction in favor of insertion-order
    pub fn without_lru(mut self) -> Self {
        self.enable_lru = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::NonPositive {
                field: "cache.max_entries",
            });
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::NonPositive { field: "cache.ttl" });
        }
        Ok(())
    }
}

/// Cached entry with access tracking
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// The cached data
    data: V,

    /// When the entry was created
    created_at: Instant,

    /// Hits recorded against this entry
    access_count: u64,

    /// Last access time (for LRU ordering)
    last_accessed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(data: V) -> Self {
        let now = Instant::now();
        Self {
            data,
            created_at: now,
            access_count: 0,
            last_accessed: now,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }

    fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed = Instant::now();
    }
}

/// Hit/miss/eviction counters for one category
#[derive(Debug, Default, Clone)]
struct CategoryCounters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    ewma_hit_rate: f64,
}

impl CategoryCounters {
    fn record_hit(&mut self) {
        self.hits += 1;
        self.ewma_hit_rate = (1.0 - EWMA_ALPHA) * self.ewma_hit_rate + EWMA_ALPHA;
    }

    fn record_miss(&mut self) {
        self.misses += 1;
        self.ewma_hit_rate *= 1.0 - EWMA_ALPHA;
    }
}

/// One independent category: its entries, limits, and counters
#[derive(Debug)]
struct CategoryCache<V> {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry<V>>,
    counters: CategoryCounters,
}

impl<V: Clone> CategoryCache<V> {
    fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            counters: CategoryCounters::default(),
        }
    }

    /// TTL is enforced here, at read time; an expired entry is removed and
    /// the read counts as a miss.
    fn get(&mut self, key: &str) -> Option<V> {
        let ttl = self.config.ttl;
        if matches!(self.entries.get(key), Some(e) if e.is_expired(ttl)) {
            self.entries.remove(key);
            self.counters.expirations += 1;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch();
                let data = entry.data.clone();
                self.counters.record_hit();
                Some(data)
            },
            None => {
                self.counters.record_miss();
                None
            },
        }
    }

    fn insert(&mut self, key: String, value: V) {
        // Replacing an existing key never needs room
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.evict_batch();
        }
        self.entries.insert(key, CacheEntry::new(value));
    }

    /// Remove the least-recently-accessed 25% of entries in one pass.
    ///
    /// With LRU disabled the same batch is selected by creation time, so the
    /// size cap holds either way.
    fn evict_batch(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        let mut candidates: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|(k, e)| {
                let ts = if self.config.enable_lru {
                    e.last_accessed
                } else {
                    e.created_at
                };
                (k.clone(), ts)
            })
            .collect();
        candidates.sort_by_key(|(_, ts)| *ts);

        let batch = ((candidates.len() as f64 * EVICTION_FRACTION).ceil() as usize).max(1);
        for (key, _) in candidates.into_iter().take(batch) {
            self.entries.remove(&key);
            self.counters.evictions += 1;
        }

        debug!(evicted = batch, remaining = self.entries.len(), "Cache batch eviction");
    }

    fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.config.ttl;
        self.entries.retain(|_, e| !e.is_expired(ttl));
        let removed = before - self.entries.len();
        self.counters.expirations += removed as u64;
        removed
    }

    fn snapshot(&self, category: CacheCategory) -> CategoryStatsSnapshot {
        let total = self.counters.hits + self.counters.misses;
        CategoryStatsSnapshot {
            category: category.as_str(),
            entries: self.entries.len(),
            hits: self.counters.hits,
            misses: self.counters.misses,
            hit_rate: if total > 0 {
                self.counters.hits as f64 / total as f64
            } else {
                0.0
            },
            ewma_hit_rate: self.counters.ewma_hit_rate,
            evictions: self.counters.evictions,
            expirations: self.counters.expirations,
        }
    }
}

/// Named collection of independent category caches
///
/// Not thread-safe by design: all operations take `&mut self` and the facade
/// adds the lock at its own boundary (keeping the hot path lock-free in the
/// common single-threaded case).
///
/// # Example
///
/// ```rust
/// use progression_perf::cache::{CacheConfig, CacheStore};
/// use progression_perf::types::CacheCategory;
///
/// let mut store: CacheStore<u32> = CacheStore::new(CacheConfig::default()).unwrap();
/// store.insert(CacheCategory::Compatibility, "1-warrior-1".to_string(), 7);
/// assert_eq!(store.get(CacheCategory::Compatibility, "1-warrior-1"), Some(7));
/// ```
#[derive(Debug)]
pub struct CacheStore<V> {
    categories: HashMap<CacheCategory, CategoryCache<V>>,
}

impl<V: Clone> CacheStore<V> {
    /// Create a store with the same configuration for every category
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        Self::with_overrides(config, HashMap::new())
    }

    /// Create a store with per-category configuration overrides
    ///
    /// Categories without an override use `default_config`. All
    /// configurations are validated before any category is built.
    pub fn with_overrides(
        default_config: CacheConfig,
        overrides: HashMap<CacheCategory, CacheConfig>,
    ) -> Result<Self, ConfigError> {
        default_config.validate()?;
        for cfg in overrides.values() {
            cfg.validate()?;
        }

        let mut categories = HashMap::with_capacity(CacheCategory::ALL.len());
        for category in CacheCategory::ALL {
            let cfg = overrides
                .get(&category)
                .cloned()
                .unwrap_or_else(|| default_config.clone());
            categories.insert(category, CategoryCache::new(cfg));
        }

        Ok(Self { categories })
    }

    /// Look up a cached value.
    ///
    /// Returns `None` on a miss or an expired entry; a hit refreshes the
    /// entry's access time and count.
    pub fn get(&mut self, category: CacheCategory, key: &str) -> Option<V> {
        self.category_mut(category).get(key)
    }

    /// Look up a cached value, computing and storing it on a miss.
    ///
    /// The compute closure must be deterministic for the key so that caching
    /// is sound; that contract belongs to the caller.
    pub fn get_or_compute<F>(&mut self, category: CacheCategory, key: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(category, key) {
            return value;
        }
        let value = compute();
        self.insert(category, key.to_string(), value.clone());
        value
    }

    /// Insert a value, evicting a batch first if the category is full
    pub fn insert(&mut self, category: CacheCategory, key: String, value: V) {
        self.category_mut(category).insert(key, value);
    }

    /// Remove one entry, returning it if present and not expired
    pub fn remove(&mut self, category: CacheCategory, key: &str) -> Option<V> {
        let cache = self.category_mut(category);
        let ttl = cache.config.ttl;
        cache
            .entries
            .remove(key)
            .filter(|e| !e.is_expired(ttl))
            .map(|e| e.data)
    }

    /// Clear one category, or every category when `None`
    pub fn clear(&mut self, category: Option<CacheCategory>) {
        match category {
            Some(c) => self.category_mut(c).entries.clear(),
            None => {
                for cache in self.categories.values_mut() {
                    cache.entries.clear();
                }
            },
        }
    }

    /// Remove every expired entry across all categories.
    ///
    /// TTL is normally enforced lazily at read time; this sweep exists for
    /// the memory monitor's cleanup hook so stale entries do not linger
    /// unread under memory pressure. Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.categories
            .values_mut()
            .map(|c| c.cleanup_expired())
            .sum()
    }

    /// Number of live entries in one category (expired-but-unread included)
    pub fn len(&self, category: CacheCategory) -> usize {
        self.categories
            .get(&category)
            .map(|c| c.entries.len())
            .unwrap_or(0)
    }

    /// Check whether every category is empty
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|c| c.entries.is_empty())
    }

    /// Point-in-time statistics across all categories
    pub fn stats(&self) -> CacheStoreStats {
        let mut snapshots: Vec<CategoryStatsSnapshot> = CacheCategory::ALL
            .iter()
            .filter_map(|c| self.categories.get(c).map(|cache| cache.snapshot(*c)))
            .collect();
        snapshots.sort_by_key(|s| s.category);

        CacheStoreStats::aggregate(snapshots)
    }

    fn category_mut(&mut self, category: CacheCategory) -> &mut CategoryCache<V> {
        self.categories
            .get_mut(&category)
            .expect("all categories are built at construction")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn small_store(max_entries: usize) -> CacheStore<String> {
        CacheStore::new(CacheConfig::default().with_max_entries(max_entries)).unwrap()
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        assert!(CacheConfig::default().with_max_entries(0).validate().is_err());
        assert!(CacheConfig::default()
            .with_ttl(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_set_then_get() {
        let mut store = small_store(10);
        store.insert(
            CacheCategory::StatModifiers,
            "1-warrior-1".to_string(),
            "hp10".to_string(),
        );
        assert_eq!(
            store.get(CacheCategory::StatModifiers, "1-warrior-1"),
            Some("hp10".to_string())
        );
    }

    #[test]
    fn test_miss_without_compute_has_no_side_effect_on_entries() {
        let mut store = small_store(10);
        assert_eq!(store.get(CacheCategory::SkillList, "nope"), None);
        assert_eq!(store.len(CacheCategory::SkillList), 0);
    }

    #[test]
    fn test_get_or_compute_stores_on_miss() {
        let mut store = small_store(10);
        let v = store.get_or_compute(CacheCategory::SkillList, "1-sage-1", || {
            "heal,focus".to_string()
        });
        assert_eq!(v, "heal,focus");
        // Second lookup is a hit and must not recompute
        let v2 = store.get_or_compute(CacheCategory::SkillList, "1-sage-1", || {
            panic!("should not recompute")
        });
        assert_eq!(v2, "heal,focus");
    }

    #[test]
    fn test_ttl_expiry_behaves_as_miss() {
        let mut store: CacheStore<u32> = CacheStore::new(
            CacheConfig::default().with_ttl(Duration::from_millis(10)),
        )
        .unwrap();
        store.insert(CacheCategory::Compatibility, "k".to_string(), 1);
        assert_eq!(store.get(CacheCategory::Compatibility, "k"), Some(1));

        sleep(Duration::from_millis(25));
        assert_eq!(store.get(CacheCategory::Compatibility, "k"), None);
        // The expired entry was deleted, not just hidden
        assert_eq!(store.len(CacheCategory::Compatibility), 0);
    }

    #[test]
    fn test_lru_eviction_drops_oldest_quarter() {
        let mut store = small_store(8);
        for i in 0..8 {
            store.insert(
                CacheCategory::StatModifiers,
                format!("k{}", i),
                "v".to_string(),
            );
            sleep(Duration::from_millis(2));
        }
        // Touch everything except k0 and k1 so they become the LRU tail
        for i in 2..8 {
            store.get(CacheCategory::StatModifiers, &format!("k{}", i));
            sleep(Duration::from_millis(2));
        }

        store.insert(CacheCategory::StatModifiers, "k8".to_string(), "v".to_string());

        // 25% of 8 = 2 evicted: the two least recently accessed
        assert_eq!(store.get(CacheCategory::StatModifiers, "k0"), None);
        assert_eq!(store.get(CacheCategory::StatModifiers, "k1"), None);
        // The most recently accessed key survives
        assert!(store.get(CacheCategory::StatModifiers, "k7").is_some());
        assert!(store.get(CacheCategory::StatModifiers, "k8").is_some());
        assert!(store.len(CacheCategory::StatModifiers) <= 8);
    }

    #[test]
    fn test_size_cap_never_exceeded() {
        let mut store = small_store(5);
        for i in 0..50 {
            store.insert(
                CacheCategory::RankUpRequirements,
                format!("k{}", i),
                "v".to_string(),
            );
            assert!(store.len(CacheCategory::RankUpRequirements) <= 5);
        }
    }

    #[test]
    fn test_eviction_is_per_category() {
        let mut store = small_store(4);
        store.insert(CacheCategory::SkillList, "keep".to_string(), "v".to_string());
        for i in 0..20 {
            store.insert(
                CacheCategory::StatModifiers,
                format!("k{}", i),
                "v".to_string(),
            );
        }
        // Filling one category never evicts from another
        assert!(store.get(CacheCategory::SkillList, "keep").is_some());
    }

    #[test]
    fn test_fifo_fallback_when_lru_disabled() {
        let mut store: CacheStore<u32> =
            CacheStore::new(CacheConfig::default().with_max_entries(4).without_lru()).unwrap();
        for i in 0..4 {
            store.insert(CacheCategory::Compatibility, format!("k{}", i), i);
            sleep(Duration::from_millis(2));
        }
        // Access the oldest entry; FIFO mode must still evict it
        store.get(CacheCategory::Compatibility, "k0");
        store.insert(CacheCategory::Compatibility, "k4".to_string(), 4);

        assert_eq!(store.get(CacheCategory::Compatibility, "k0"), None);
        assert!(store.len(CacheCategory::Compatibility) <= 4);
    }

    #[test]
    fn test_hit_rate_tracking() {
        let mut store = small_store(10);
        store.insert(CacheCategory::StatModifiers, "k".to_string(), "v".to_string());
        store.get(CacheCategory::StatModifiers, "k");
        store.get(CacheCategory::StatModifiers, "missing");

        let stats = store.stats();
        let cat = stats
            .categories
            .iter()
            .find(|s| s.category == "stat_modifiers")
            .unwrap();
        assert_eq!(cat.hits, 1);
        assert_eq!(cat.misses, 1);
        assert!((cat.hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(cat.ewma_hit_rate > 0.0);
    }

    #[test]
    fn test_remove_returns_live_entries_only() {
        let mut store = small_store(10);
        store.insert(CacheCategory::SkillList, "a".to_string(), "v".to_string());
        assert_eq!(
            store.remove(CacheCategory::SkillList, "a"),
            Some("v".to_string())
        );
        assert_eq!(store.remove(CacheCategory::SkillList, "a"), None);
    }

    #[test]
    fn test_clear_single_and_all() {
        let mut store = small_store(10);
        store.insert(CacheCategory::StatModifiers, "a".to_string(), "v".to_string());
        store.insert(CacheCategory::SkillList, "b".to_string(), "v".to_string());

        store.clear(Some(CacheCategory::StatModifiers));
        assert_eq!(store.len(CacheCategory::StatModifiers), 0);
        assert_eq!(store.len(CacheCategory::SkillList), 1);

        store.clear(None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_expired_sweep() {
        let mut store: CacheStore<u32> = CacheStore::new(
            CacheConfig::default().with_ttl(Duration::from_millis(5)),
        )
        .unwrap();
        store.insert(CacheCategory::StatModifiers, "a".to_string(), 1);
        store.insert(CacheCategory::SkillList, "b".to_string(), 2);

        sleep(Duration::from_millis(15));
        let removed = store.cleanup_expired();
        assert_eq!(removed, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_category_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(
            CacheCategory::Compatibility,
            CacheConfig::default().with_max_entries(2),
        );
        let mut store: CacheStore<u32> =
            CacheStore::with_overrides(CacheConfig::default(), overrides).unwrap();

        for i in 0..10 {
            store.insert(CacheCategory::Compatibility, format!("k{}", i), i);
        }
        assert!(store.len(CacheCategory::Compatibility) <= 2);
    }
}
