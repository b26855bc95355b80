//! Tracked reference registry for leak detection
//!
//! Callers register long-lived objects they want watched; the monitor's leak
//! pass reports references that stay referenced far beyond their expected
//! lifetime, and the cleanup paths sweep idle or released entries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// A registered long-lived object handle
#[derive(Debug, Clone)]
pub struct TrackedReference {
    /// Registry-assigned id
    pub id: u64,
    /// Caller-supplied type tag, e.g. `"job_state"`
    pub type_tag: String,
    /// Registration time
    pub created_at: Instant,
    /// Last explicit touch
    pub last_accessed: Instant,
    /// Outstanding reference count
    pub ref_count: u32,
    /// Caller-estimated size in bytes
    pub approx_size_bytes: usize,
}

impl TrackedReference {
    /// Age since registration
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the last touch
    pub fn idle(&self) -> Duration {
        self.last_accessed.elapsed()
    }
}

/// Point-in-time registry summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerSnapshot {
    /// Registered references
    pub tracked: usize,
    /// Sum of caller-estimated sizes
    pub approx_bytes: usize,
}

/// Registry of tracked references
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    refs: HashMap<u64, TrackedReference>,
    next_id: u64,
}

impl ReferenceTracker {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object; the returned id addresses every later call.
    /// The initial reference count is 1.
    pub fn track(&mut self, type_tag: impl Into<String>, approx_size_bytes: usize) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let now = Instant::now();
        self.refs.insert(
            id,
            TrackedReference {
                id,
                type_tag: type_tag.into(),
                created_at: now,
                last_accessed: now,
                ref_count: 1,
                approx_size_bytes,
            },
        );
        id
    }

    /// Record an access; unknown ids are ignored
    pub fn touch(&mut self, id: u64) {
        if let Some(r) = self.refs.get_mut(&id) {
            r.last_accessed = Instant::now();
        }
    }

    /// Add one reference; unknown ids are ignored
    pub fn add_ref(&mut self, id: u64) {
        if let Some(r) = self.refs.get_mut(&id) {
            r.ref_count += 1;
        }
    }

    /// Drop one reference; the entry is removed when the count reaches zero.
    /// Returns whether the entry was removed.
    pub fn release(&mut self, id: u64) -> bool {
        if let Some(r) = self.refs.get_mut(&id) {
            r.ref_count = r.ref_count.saturating_sub(1);
            if r.ref_count == 0 {
                self.refs.remove(&id);
                return true;
            }
        }
        false
    }

    /// Remove an entry regardless of its reference count
    pub fn untrack(&mut self, id: u64) {
        self.refs.remove(&id);
    }

    /// Remove any entry whose reference count is zero.
    /// Returns the number removed.
    pub fn drop_zero_refs(&mut self) -> usize {
        let before = self.refs.len();
        self.refs.retain(|_, r| r.ref_count > 0);
        before - self.refs.len()
    }

    /// Remove entries untouched for longer than `idle_age`.
    /// Returns the number removed.
    pub fn drop_idle(&mut self, idle_age: Duration) -> usize {
        let before = self.refs.len();
        self.refs.retain(|_, r| r.idle() <= idle_age);
        before - self.refs.len()
    }

    /// References still referenced past `stale_age`, for the leak pass
    pub fn stale_refs(&self, stale_age: Duration) -> Vec<&TrackedReference> {
        self.refs
            .values()
            .filter(|r| r.ref_count > 0 && r.age() > stale_age)
            .collect()
    }

    /// Number of registered references
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.refs.clear();
    }

    /// Point-in-time summary
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            tracked: self.refs.len(),
            approx_bytes: self.refs.values().map(|r| r.approx_size_bytes).sum(),
        }
    }
}
