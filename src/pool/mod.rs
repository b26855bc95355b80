//! Recyclable object pools for progression result records
//!
//! Rank-up resolution and UI batching churn through short-lived result
//! records every frame; pooling them avoids per-frame allocation spikes.
//! Each pooled type supplies an explicit `reset` restoring its zero-value
//! shape, so a re-acquired object never leaks state from its previous use.
//!
//! # Features
//!
//! - Lazy growth by `ceil(target * growth_factor)` instances on exhaustion
//! - Bounded residency: releases beyond `max_size` are dropped, not kept
//! - Periodic shrink back toward the initial size after bursts
//!
//! Pools are deliberately not thread-safe: the facade owns the lock at its
//! boundary so the hot path stays lock-free in the single-threaded case.

pub mod records;

pub use records::{ChangeResultRecord, StatModifierRecord, UiBatchRecord};

use serde::Serialize;
use tracing::debug;

use crate::error::ConfigError;

/// A type that can live in an [`ObjectPool`]
///
/// `reset` must restore the zero-value shape: numeric fields to 0, sequences
/// and maps cleared. Supplying it per type replaces the original's runtime
/// field inspection with static dispatch.
pub trait PoolItem: Default {
    /// Restore the zero-value shape before the object returns to the pool
    fn reset(&mut self);
}

/// Configuration for one object pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Growth target before the first growth event (default: 10)
    pub initial_size: usize,

    /// Maximum resident (free) objects; releases beyond this are dropped
    /// (default: 100)
    pub max_size: usize,

    /// Multiplier applied to the growth target on exhaustion (default: 1.5)
    pub growth_factor: f64,

    /// Utilization below which `maintenance` trims the free list back toward
    /// the initial size (default: 0.3)
    pub shrink_threshold: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 10,
            max_size: 100,
            growth_factor: 1.5,
            shrink_threshold: 0.3,
        }
    }
}

impl PoolConfig {
    /// Set the initial growth target
    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Set the resident cap
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the growth multiplier
    pub fn with_growth_factor(mut self, growth_factor: f64) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "pool.max_size",
            });
        }
        if self.initial_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "pool.initial_size",
            });
        }
        if self.initial_size > self.max_size {
            return Err(ConfigError::Inconsistent {
                message: format!(
                    "pool.initial_size {} exceeds pool.max_size {}",
                    self.initial_size, self.max_size
                ),
            });
        }
        if self.growth_factor <= 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "pool.growth_factor",
                value: self.growth_factor.to_string(),
                min: "> 1.0".to_string(),
                max: "any".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.shrink_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "pool.shrink_threshold",
                value: self.shrink_threshold.to_string(),
                min: "0.0".to_string(),
                max: "1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Point-in-time counters for one pool
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolStatsSnapshot {
    /// Objects constructed over the pool's lifetime
    pub created: u64,
    /// Acquires served from the free list (no allocation)
    pub reused: u64,
    /// Total acquires
    pub acquired: u64,
    /// Total releases
    pub released: u64,
    /// Releases dropped because the pool was at capacity
    pub dropped: u64,
    /// Objects removed by shrink maintenance
    pub shrunk: u64,
    /// Current free-list length
    pub free: usize,
    /// `(max_size - free) / max_size`
    pub utilization: f64,
}

/// A pool of reusable objects of one type
///
/// Objects are either checked out (owned by the caller) or resident (owned by
/// the pool with contents reset). The pool allocates lazily: construction
/// creates nothing, and the first acquire on an empty pool triggers a growth
/// event.
pub struct ObjectPool<T: PoolItem> {
    config: PoolConfig,
    free: Vec<T>,
    /// Current growth target; starts at `initial_size` and advances with
    /// each growth event
    target: usize,
    created: u64,
    reused: u64,
    acquired: u64,
    released: u64,
    dropped: u64,
    shrunk: u64,
}

impl<T: PoolItem> ObjectPool<T> {
    /// Create a pool with the given configuration
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let target = config.initial_size;
        Ok(Self {
            config,
            free: Vec::new(),
            target,
            created: 0,
            reused: 0,
            acquired: 0,
            released: 0,
            dropped: 0,
            shrunk: 0,
        })
    }

    /// Create a pool with default configuration
    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default()).expect("default pool config is valid")
    }

    /// Take an object from the pool, growing it first if empty
    pub fn acquire(&mut self) -> T {
        self.acquired += 1;
        if self.free.is_empty() {
            self.grow();
        } else {
            self.reused += 1;
        }
        // grow() always leaves at least one resident object
        self.free.pop().unwrap_or_default()
    }

    /// Return an object to the pool.
    ///
    /// At capacity the object is dropped instead, bounding worst-case memory
    /// under bursty allocation; otherwise it is reset and kept resident.
    pub fn release(&mut self, mut obj: T) {
        self.released += 1;
        if self.free.len() >= self.config.max_size {
            self.dropped += 1;
            return;
        }
        obj.reset();
        self.free.push(obj);
    }

    /// `(max_size - free) / max_size`: the share of the pool's capacity not
    /// currently sitting resident
    pub fn utilization(&self) -> f64 {
        (self.config.max_size - self.free.len()) as f64 / self.config.max_size as f64
    }

    /// Trim an over-grown free list back toward the initial size when
    /// utilization has fallen below the shrink threshold.
    ///
    /// Returns the number of objects released to the allocator. The free list
    /// never shrinks below the initial size.
    pub fn maintenance(&mut self) -> usize {
        if self.utilization() >= self.config.shrink_threshold {
            return 0;
        }
        if self.free.len() <= self.config.initial_size {
            return 0;
        }
        let removed = self.free.len() - self.config.initial_size;
        self.free.truncate(self.config.initial_size);
        self.target = self.config.initial_size;
        self.shrunk += removed as u64;
        debug!(removed, resident = self.free.len(), "Pool shrink");
        removed
    }

    /// Current free-list length
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Drop every resident object and reset the growth target
    pub fn clear(&mut self) {
        self.free.clear();
        self.target = self.config.initial_size;
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            created: self.created,
            reused: self.reused,
            acquired: self.acquired,
            released: self.released,
            dropped: self.dropped,
            shrunk: self.shrunk,
            free: self.free.len(),
            utilization: self.utilization(),
        }
    }

    /// Allocate `ceil(target * growth_factor)` fresh zero-value instances,
    /// capped so the free list never exceeds `max_size`.
    fn grow(&mut self) {
        let want = (self.target as f64 * self.config.growth_factor).ceil() as usize;
        let room = self.config.max_size - self.free.len();
        let count = want.min(room).max(1);

        self.free.reserve(count);
        for _ in 0..count {
            self.free.push(T::default());
        }
        self.created += count as u64;
        self.target = count.max(self.config.initial_size);

        debug!(allocated = count, target = self.target, "Pool growth");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Probe {
        value: u64,
        tags: Vec<String>,
    }

    impl PoolItem for Probe {
        fn reset(&mut self) {
            self.value = 0;
            self.tags.clear();
        }
    }

    fn pool(initial: usize, max: usize) -> ObjectPool<Probe> {
        ObjectPool::new(
            PoolConfig::default()
                .with_initial_size(initial)
                .with_max_size(max),
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(PoolConfig::default().validate().is_ok());
        assert!(PoolConfig::default().with_max_size(0).validate().is_err());
        assert!(PoolConfig::default()
            .with_growth_factor(1.0)
            .validate()
            .is_err());
        assert!(PoolConfig::default()
            .with_initial_size(200)
            .with_max_size(100)
            .validate()
            .is_err());
    }

    #[test]
    fn test_first_acquire_grows_by_factor() {
        // Empty pool, target 10, factor 1.5: growth allocates 15, one is
        // checked out, 14 stay resident
        let mut p = pool(10, 100);
        let obj = p.acquire();
        assert_eq!(obj, Probe::default());
        assert_eq!(p.free_len(), 14);
        assert_eq!(p.stats().created, 15);
    }

    #[test]
    fn test_release_beyond_max_is_dropped() {
        let mut p = pool(2, 4);
        for i in 0..8 {
            p.release(Probe {
                value: i,
                tags: vec![],
            });
        }
        assert_eq!(p.free_len(), 4);
        assert_eq!(p.stats().dropped, 4);
    }

    #[test]
    fn test_reacquired_object_is_reset() {
        let mut p = pool(2, 10);
        let mut obj = p.acquire();
        obj.value = 99;
        obj.tags.push("dirty".to_string());
        p.release(obj);

        // Drain until we get the released object back
        let mut saw_reset = false;
        for _ in 0..p.free_len() {
            let o = p.acquire();
            assert_eq!(o.value, 0);
            assert!(o.tags.is_empty());
            saw_reset = true;
        }
        assert!(saw_reset);
    }

    #[test]
    fn test_free_list_never_exceeds_max() {
        let mut p = pool(10, 20);
        let mut held = Vec::new();
        for _ in 0..40 {
            held.push(p.acquire());
        }
        for obj in held {
            p.release(obj);
            assert!(p.free_len() <= 20);
        }
    }

    #[test]
    fn test_shrink_trims_toward_initial() {
        let mut p = pool(5, 20);
        // Burst: fill the free list to capacity
        let held: Vec<Probe> = (0..20).map(|_| p.acquire()).collect();
        for obj in held {
            p.release(obj);
        }
        assert_eq!(p.free_len(), 20);
        // Utilization 0.0 < 0.3 threshold: shrink back to initial
        let removed = p.maintenance();
        assert_eq!(removed, 15);
        assert_eq!(p.free_len(), 5);
        // Idempotent at the floor
        assert_eq!(p.maintenance(), 0);
    }

    #[test]
    fn test_no_shrink_when_busy() {
        let mut p = pool(5, 10);
        let _held: Vec<Probe> = (0..8).map(|_| p.acquire()).collect();
        // Few residents left: utilization high, nothing to trim
        assert_eq!(p.maintenance(), 0);
    }

    #[test]
    fn test_utilization_bounds() {
        let mut p = pool(10, 100);
        assert!((p.utilization() - 1.0).abs() < f64::EPSILON);
        let obj = p.acquire();
        assert!(p.utilization() < 1.0);
        p.release(obj);
        let u = p.utilization();
        assert!((0.0..=1.0).contains(&u));
    }

    #[test]
    fn test_reuse_counter() {
        let mut p = pool(2, 10);
        let a = p.acquire(); // grows, not a reuse
        p.release(a);
        let _b = p.acquire(); // served from the free list
        assert!(p.stats().reused >= 1);
    }
}
