//! Priority-based batched UI update scheduling
//!
//! Collects update requests from progression code, suppresses redundant and
//! invisible-element work via dirty-checking, merges duplicates, orders by
//! priority with dependency resolution, and executes the result in batches
//! against a per-tick time budget.
//!
//! # Request lifecycle
//!
//! ```text
//! queued ──▶ batched ──▶ executed          (terminal)
//!    └──────▶ dropped                      (terminal: suppression / overflow)
//! ```
//!
//! The scheduler is deliberately not thread-safe: it is driven by the host's
//! per-frame callback and the facade owns the lock at its boundary.

pub mod batcher;
pub mod request;

pub use batcher::{SchedulerConfig, SchedulerStats, TickReport, UpdateHandler, UpdateScheduler};
pub use request::{DropReason, ElementState, RequestOutcome, UpdateBatch, UpdateRequest};
