//! Update request, batch, and element tracking types

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::types::{UpdateKind, UpdatePriority};

/// A single UI update request
///
/// Ephemeral: created by a caller, consumed (executed, merged, or dropped)
/// within one scheduling pass, never persisted.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Unique monotonic request id
    pub id: u64,

    /// Element target, e.g. `"char1"` or `"party_panel"`
    pub target: String,

    /// What kind of refresh this is
    pub kind: UpdateKind,

    /// Urgency; `Immediate` bypasses batching entirely
    pub priority: UpdatePriority,

    /// Opaque payload handed to the dispatched handler
    pub payload: Value,

    /// Requests that must execute before this one
    pub dependency_ids: HashSet<u64>,

    /// Creation time
    pub created_at: Instant,
}

impl UpdateRequest {
    /// Create a new request with a fresh id and no dependencies
    pub fn new(target: impl Into<String>, kind: UpdateKind, priority: UpdatePriority, payload: Value) -> Self {
        static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        Self {
            id: REQUEST_COUNTER.fetch_add(1, Ordering::SeqCst),
            target: target.into(),
            kind,
            priority,
            payload,
            dependency_ids: HashSet::new(),
            created_at: Instant::now(),
        }
    }

    /// Add dependencies that must execute before this request
    pub fn with_dependencies(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.dependency_ids.extend(ids);
        self
    }
}

/// A priority-homogeneous ordered group of requests
///
/// Constructed by the scheduler during a tick, consumed and discarded after
/// execution.
#[derive(Debug)]
pub struct UpdateBatch {
    /// Shared priority of every request in the batch
    pub priority: UpdatePriority,

    /// Requests in execution order
    pub requests: Vec<UpdateRequest>,

    /// Estimated execution cost from prior observations of the same targets
    pub estimated_cost: Duration,
}

impl UpdateBatch {
    /// Create an empty batch at the given priority
    pub fn new(priority: UpdatePriority) -> Self {
        Self {
            priority,
            requests: Vec::new(),
            estimated_cost: Duration::ZERO,
        }
    }

    /// Number of requests in the batch
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Per-(target, kind) tracking record used by dirty-checking
///
/// Long-lived: one per distinct pair observed, mutated on every request and
/// execution.
#[derive(Debug, Clone)]
pub struct ElementState {
    /// When this pair last had an update executed
    pub last_update: Option<Instant>,

    /// Updates executed for this pair
    pub update_count: u64,

    /// A request arrived since the last execution
    pub dirty: bool,

    /// Visibility flag maintained by `set_visibility`
    pub visible: bool,

    /// Observed cost of the last execution for this pair
    pub estimated_cost: Duration,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            last_update: None,
            update_count: 0,
            dirty: false,
            // Elements are assumed visible until told otherwise
            visible: true,
            estimated_cost: Duration::ZERO,
        }
    }
}

/// Outcome of submitting a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// `Immediate` priority: executed synchronously, never queued
    Executed,
    /// Queued for the next tick under the given id
    Queued(u64),
    /// Merged into an already-queued request for the same (target, kind)
    Merged(u64),
    /// Dropped before queueing
    Dropped(DropReason),
}

/// Why a request was dropped at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The target/kind pair is marked not visible
    NotVisible,
    /// The pair was updated within the minimum interval and is not dirty
    RecentlyUpdated,
    /// The queue is at capacity
    QueueFull,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids_are_unique_and_monotonic() {
        let a = UpdateRequest::new("t", UpdateKind::StatPanel, UpdatePriority::Normal, json!({}));
        let b = UpdateRequest::new("t", UpdateKind::StatPanel, UpdatePriority::Normal, json!({}));
        assert!(b.id > a.id);
    }

    #[test]
    fn test_with_dependencies() {
        let req = UpdateRequest::new("t", UpdateKind::SkillList, UpdatePriority::Low, json!({}))
            .with_dependencies([1, 2, 2]);
        assert_eq!(req.dependency_ids.len(), 2);
    }

    #[test]
    fn test_element_state_starts_visible_and_clean() {
        let state = ElementState::default();
        assert!(state.visible);
        assert!(!state.dirty);
        assert!(state.last_update.is_none());
    }
}
