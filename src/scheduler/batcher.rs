//! The update scheduler: suppression, merging, ordering, batching, execution

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ConfigError, HandlerError};
use crate::types::{UpdateKind, UpdatePriority};

use super::request::{DropReason, ElementState, RequestOutcome, UpdateBatch, UpdateRequest};

/// Callback dispatched for each executed update, keyed by kind.
///
/// Receives the target and the request payload. A returned error is logged
/// for that request alone and never aborts the containing batch or tick.
pub type UpdateHandler = Box<dyn FnMut(&str, &Value) -> Result<(), HandlerError> + Send>;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the update scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum requests per batch (default: 10)
    pub max_batch_size: usize,

    /// Per-tick execution time budget (default: 16.67 ms, one 60 Hz frame)
    pub frame_budget: Duration,

    /// Window after an execution in which a non-dirty repeat request for the
    /// same (target, kind) is suppressed (default: 16 ms)
    pub min_update_interval: Duration,

    /// Maximum queued requests; submissions beyond this are dropped
    /// (default: 1000)
    pub max_queue_size: usize,

    /// How many requests a stalled dependency pass may flush in last-seen
    /// order. A termination safety valve for dependency cycles, not
    /// load-bearing behavior; the default of 100 matches the queue scale,
    /// nothing more (default: 100)
    pub dependency_flush_limit: usize,

    /// Enable dirty-check suppression (default: true)
    pub enable_dirty_check: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            frame_budget: Duration::from_micros(16_670),
            min_update_interval: Duration::from_millis(16),
            max_queue_size: 1000,
            dependency_flush_limit: 100,
            enable_dirty_check: true,
        }
    }
}

impl SchedulerConfig {
    /// Set the batch size cap
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the per-tick time budget
    pub fn with_frame_budget(mut self, frame_budget: Duration) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    /// Set the dirty-check suppression window
    pub fn with_min_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval = interval;
        self
    }

    /// Disable dirty-check suppression
    pub fn without_dirty_check(mut self) -> Self {
        self.enable_dirty_check = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "scheduler.max_batch_size",
            });
        }
        if self.frame_budget.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "scheduler.frame_budget",
            });
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "scheduler.max_queue_size",
            });
        }
        if self.dependency_flush_limit == 0 {
            return Err(ConfigError::NonPositive {
                field: "scheduler.dependency_flush_limit",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters collected by the scheduler
#[derive(Debug, Default, Clone, Serialize)]
pub struct SchedulerStats {
    /// Scheduling ticks run
    pub ticks: u64,

    /// Updates dispatched to a handler (including failed dispatches)
    pub executed: u64,

    /// Immediate-priority updates executed synchronously at submission
    pub immediate_executed: u64,

    /// Requests merged into an already-queued duplicate
    pub merged: u64,

    /// Requests dropped by dirty-check suppression
    pub suppressed: u64,

    /// Requests dropped because the queue was full
    pub dropped_overflow: u64,

    /// Dispatches whose handler returned an error
    pub failed: u64,

    /// Batches constructed
    pub batches_built: u64,

    /// Ticks whose executed batches overran the frame budget
    pub frame_drops: u64,

    /// Requests currently queued
    pub queue_len: usize,
}

/// Result of one scheduling tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Updates dispatched this tick
    pub executed: usize,
    /// Batches executed this tick
    pub batches: usize,
    /// Whether the executed batches overran the budget
    pub frame_dropped: bool,
    /// Requests pushed to the next tick (budget overrun or cycle overflow)
    pub deferred: usize,
    /// Wall-clock time spent executing
    pub elapsed: Duration,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Priority-based batched update scheduler
///
/// Driven once per frame by the host's tick callback. See the module docs
/// for the request lifecycle.
pub struct UpdateScheduler {
    config: SchedulerConfig,

    /// Pending requests; at most one per (target, kind) thanks to merging
    queue: VecDeque<UpdateRequest>,

    /// Dirty-check state per (target, kind) pair observed
    element_states: HashMap<(String, UpdateKind), ElementState>,

    /// Dispatched callbacks keyed by update kind
    handlers: HashMap<UpdateKind, UpdateHandler>,

    stats: SchedulerStats,
}

impl UpdateScheduler {
    /// Create a scheduler with the given configuration
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            queue: VecDeque::new(),
            element_states: HashMap::new(),
            handlers: HashMap::new(),
            stats: SchedulerStats::default(),
        })
    }

    /// Create a scheduler with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SchedulerConfig::default()).expect("default scheduler config is valid")
    }

    /// Register the callback dispatched for a kind, replacing any previous one
    pub fn register_handler(&mut self, kind: UpdateKind, handler: UpdateHandler) {
        self.handlers.insert(kind, handler);
    }

    /// Update the visibility flag for a (target, kind) pair.
    ///
    /// Touches ElementState only: it neither triggers nor cancels in-flight
    /// work. Already-queued requests for the pair still execute; the *next*
    /// submission is what the flag gates.
    pub fn set_visibility(&mut self, target: &str, kind: UpdateKind, visible: bool) {
        self.element_states
            .entry((target.to_string(), kind))
            .or_default()
            .visible = visible;
    }

    /// Convenience wrapper building a dependency-free request
    pub fn request(
        &mut self,
        target: impl Into<String>,
        kind: UpdateKind,
        priority: UpdatePriority,
        payload: Value,
    ) -> RequestOutcome {
        self.submit(UpdateRequest::new(target, kind, priority, payload))
    }

    /// Submit a request.
    ///
    /// `Immediate` priority executes synchronously, bypassing batching.
    /// Everything else passes dirty-checking, merges into a queued duplicate
    /// when one exists, and otherwise queues (or drops on overflow).
    pub fn submit(&mut self, req: UpdateRequest) -> RequestOutcome {
        if req.priority == UpdatePriority::Immediate {
            self.execute_single(&req);
            self.stats.immediate_executed += 1;
            return RequestOutcome::Executed;
        }

        let key = (req.target.clone(), req.kind);

        if self.config.enable_dirty_check {
            let state = self.element_states.entry(key.clone()).or_default();

            if !state.visible && !req.kind.ignores_visibility() {
                self.stats.suppressed += 1;
                return RequestOutcome::Dropped(DropReason::NotVisible);
            }

            let recently_updated = state
                .last_update
                .map(|t| t.elapsed() < self.config.min_update_interval)
                .unwrap_or(false);
            if recently_updated && !state.dirty {
                self.stats.suppressed += 1;
                return RequestOutcome::Dropped(DropReason::RecentlyUpdated);
            }
        }

        // Merge into an existing request for the same pair: newest payload
        // wins, dependency sets union, the more urgent priority is kept.
        if let Some(existing) = self
            .queue
            .iter_mut()
            .find(|r| r.target == req.target && r.kind == req.kind)
        {
            existing.payload = req.payload;
            existing.dependency_ids.extend(req.dependency_ids);
            if req.priority < existing.priority {
                existing.priority = req.priority;
            }
            let id = existing.id;
            self.stats.merged += 1;
            self.mark_dirty(&key);
            return RequestOutcome::Merged(id);
        }

        if self.queue.len() >= self.config.max_queue_size {
            self.stats.dropped_overflow += 1;
            warn!(
                target = %req.target,
                kind = %req.kind,
                queue = self.queue.len(),
                "Update request dropped: queue full"
            );
            return RequestOutcome::Dropped(DropReason::QueueFull);
        }

        let id = req.id;
        self.queue.push_back(req);
        self.mark_dirty(&key);
        RequestOutcome::Queued(id)
    }

    /// Run one scheduling pass: order, batch, and execute within the budget.
    pub fn run_tick(&mut self) -> TickReport {
        self.stats.ticks += 1;

        if self.queue.is_empty() {
            return TickReport::default();
        }

        let mut pending: Vec<UpdateRequest> = self.queue.drain(..).collect();
        // Stable sort keeps submission order within a priority level
        pending.sort_by_key(|r| r.priority.rank());

        let ordered = self.resolve_dependencies(pending);
        let mut batches = self.build_batches(ordered);
        self.stats.batches_built += batches.len() as u64;

        let tick_start = Instant::now();
        let mut report = TickReport {
            deferred: self.queue.len(),
            ..TickReport::default()
        };

        while let Some(batch) = batches.pop_front() {
            report.executed += batch.len();
            report.batches += 1;
            for req in &batch.requests {
                self.execute_single(req);
            }

            // Batches are never aborted mid-way; the budget check runs
            // between batches, so the batch that overran is the one charged
            // with the frame drop.
            if tick_start.elapsed() > self.config.frame_budget {
                self.stats.frame_drops += 1;
                report.frame_dropped = true;
                for deferred_batch in batches.drain(..) {
                    report.deferred += deferred_batch.len();
                    for req in deferred_batch.requests {
                        self.queue.push_back(req);
                    }
                }
                break;
            }
        }

        report.elapsed = tick_start.elapsed();
        self.stats.queue_len = self.queue.len();

        debug!(
            executed = report.executed,
            batches = report.batches,
            deferred = report.deferred,
            frame_dropped = report.frame_dropped,
            "Scheduler tick"
        );

        report
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.clone();
        stats.queue_len = self.queue.len();
        stats
    }

    /// Requests currently queued
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drop every queued request and tracking record
    pub fn clear(&mut self) {
        self.queue.clear();
        self.element_states.clear();
    }

    fn mark_dirty(&mut self, key: &(String, UpdateKind)) {
        self.element_states.entry(key.clone()).or_default().dirty = true;
    }

    /// Order `pending` so every request follows its dependencies.
    ///
    /// Repeated passes move any request whose dependencies are all satisfied
    /// (emitted earlier, or no longer pending at all) into the output. A pass
    /// that makes no progress means a dependency cycle: up to
    /// `dependency_flush_limit` of the remainder is flushed in last-seen
    /// order so the tick terminates, and anything beyond the limit waits for
    /// the next tick.
    fn resolve_dependencies(&mut self, pending: Vec<UpdateRequest>) -> Vec<UpdateRequest> {
        let mut ordered: Vec<UpdateRequest> = Vec::with_capacity(pending.len());
        let mut emitted: HashSet<u64> = HashSet::with_capacity(pending.len());
        let mut pending = pending;

        while !pending.is_empty() {
            let pending_ids: HashSet<u64> = pending.iter().map(|r| r.id).collect();
            let mut rest = Vec::with_capacity(pending.len());
            let mut progressed = false;

            for req in pending {
                let satisfied = req
                    .dependency_ids
                    .iter()
                    .all(|d| emitted.contains(d) || !pending_ids.contains(d));
                if satisfied {
                    emitted.insert(req.id);
                    ordered.push(req);
                    progressed = true;
                } else {
                    rest.push(req);
                }
            }
            pending = rest;

            if !progressed && !pending.is_empty() {
                let flush = pending.len().min(self.config.dependency_flush_limit);
                warn!(
                    stalled = pending.len(),
                    flushed = flush,
                    "Dependency cycle in update queue, flushing in last-seen order"
                );
                for req in pending.drain(..flush) {
                    ordered.push(req);
                }
                for req in pending {
                    self.queue.push_back(req);
                }
                break;
            }
        }

        ordered
    }

    /// Group an ordered request sequence into batches, splitting on every
    /// priority change and at `max_batch_size`.
    fn build_batches(&self, ordered: Vec<UpdateRequest>) -> VecDeque<UpdateBatch> {
        let mut batches: VecDeque<UpdateBatch> = VecDeque::new();

        for req in ordered {
            let needs_new = match batches.back() {
                Some(batch) => {
                    batch.priority != req.priority || batch.len() >= self.config.max_batch_size
                },
                None => true,
            };
            if needs_new {
                batches.push_back(UpdateBatch::new(req.priority));
            }

            let batch = batches.back_mut().expect("batch pushed above");
            let key = (req.target.clone(), req.kind);
            if let Some(state) = self.element_states.get(&key) {
                batch.estimated_cost += state.estimated_cost;
            }
            batch.requests.push(req);
        }

        batches
    }

    /// Dispatch one request to its kind's handler and update its element
    /// state. Handler faults are logged here and isolated to the request.
    fn execute_single(&mut self, req: &UpdateRequest) {
        let started = Instant::now();
        let result = match self.handlers.get_mut(&req.kind) {
            Some(handler) => handler(&req.target, &req.payload),
            None => Err(HandlerError::NoHandler(req.kind.to_string())),
        };
        let cost = started.elapsed();

        self.stats.executed += 1;
        if let Err(e) = result {
            self.stats.failed += 1;
            warn!(
                target = %req.target,
                kind = %req.kind,
                payload = %req.payload,
                error = %e,
                "Update handler failed"
            );
        }

        let state = self
            .element_states
            .entry((req.target.clone(), req.kind))
            .or_default();
        state.last_update = Some(Instant::now());
        state.update_count += 1;
        state.dirty = false;
        state.estimated_cost = cost;
    }
}

// ============================================================================
// Tests
// ============================================================================
