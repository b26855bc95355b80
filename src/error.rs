//! Error types for the progression performance layer
//!
//! Nothing in this crate propagates an error past its own public boundary
//! except construction-time validation. Runtime faults are represented as
//! returned statuses, dropped operations, or logged-and-continued side
//! effects.

use thiserror::Error;

/// Main error type for the performance layer
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Monitor lifecycle error
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// General error
    #[error("{0}")]
    General(String),
}

/// Configuration and input validation errors
///
/// Rejected at construction with a descriptive result, never thrown mid-run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: &'static str,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// A duration field was zero or negative
    #[error("{field} must be positive")]
    NonPositive {
        /// Field name being validated
        field: &'static str,
    },

    /// Two fields contradict each other
    #[error("Inconsistent configuration: {message}")]
    Inconsistent {
        /// Description of the contradiction
        message: String,
    },

    /// Configuration file could not be read or parsed
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Errors surfaced by a dispatched UI update handler
///
/// Caught at single-request granularity and logged; never aborts the
/// containing batch or tick.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler itself reported a failure
    #[error("Update handler failed: {0}")]
    Failed(String),

    /// No handler is registered for the request's kind
    #[error("No handler registered for kind '{0}'")]
    NoHandler(String),
}

/// Memory monitor lifecycle errors
#[derive(Error, Debug)]
pub enum MonitorError {
    /// `start` was called while the monitor was already running
    #[error("Monitor already running")]
    AlreadyRunning,

    /// The monitor was started outside a tokio runtime
    #[error("Monitor requires a tokio runtime: {0}")]
    NoRuntime(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
