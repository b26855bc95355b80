//! Progression performance layer - caching, pooling, scheduling, monitoring
//!
//! This library provides the performance and resource-management layer for a
//! tactical RPG's job progression subsystem:
//! - Multi-category derived-data cache with TTL expiry and batched LRU eviction
//! - Recyclable object pools with bounded growth and periodic shrink
//! - Priority-based batched UI update scheduler with dependency resolution
//!   and a per-tick frame budget
//! - Memory-sampling monitor with trend analysis and leak detection
//!
//! Everything composes behind a single [`facade::PerformanceFacade`] seam;
//! domain rules (what a job's stats or skills actually are) stay outside and
//! are supplied as compute closures and update handlers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod host;
pub mod pool;
pub mod scheduler;
pub mod types;

/// Memory monitoring and leak detection
pub mod monitor;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// The composition root consumed by the rest of the game
pub mod facade;

// Re-export main types
pub use config::Config;
pub use error::{Error, Result};
pub use facade::{FacadeBuilder, PerfMetrics, PerformanceFacade};
pub use types::{CacheCategory, DerivedData, UpdateKind, UpdatePriority};
