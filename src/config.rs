//! Configuration management for the progression performance layer
//!
//! This module provides configuration file support with TOML format and
//! sensible defaults. The file-facing structures here use plain integer
//! duration fields for clean TOML; each converts into the typed per-module
//! configuration consumed by the components.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::{ConfigError, Error, Result};
use crate::monitor::MonitorConfig;
use crate::pool::PoolConfig;
use crate::scheduler::SchedulerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Derived-data cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Object pool settings
    #[serde(default)]
    pub pool: PoolSettings,

    /// Update scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Memory monitor settings
    #[serde(default)]
    pub monitor: MonitorSettings,
}

/// Cache configuration section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Maximum entries per category
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Entry time-to-live in milliseconds
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,

    /// Evict by last access time (insertion age when disabled)
    #[serde(default = "default_true")]
    pub enable_lru: bool,
}

/// Pool configuration section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolSettings {
    /// Growth target before the first growth event
    #[serde(default = "default_pool_initial_size")]
    pub initial_size: usize,

    /// Maximum resident objects per pool
    #[serde(default = "default_pool_max_size")]
    pub max_size: usize,

    /// Growth multiplier on exhaustion
    #[serde(default = "default_pool_growth_factor")]
    pub growth_factor: f64,

    /// Utilization below which maintenance shrinks the pool
    #[serde(default = "default_pool_shrink_threshold")]
    pub shrink_threshold: f64,
}

/// Scheduler configuration section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerSettings {
    /// Maximum requests per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Per-tick execution budget in microseconds
    #[serde(default = "default_frame_budget_us")]
    pub frame_budget_us: u64,

    /// Dirty-check suppression window in milliseconds
    #[serde(default = "default_min_update_interval_ms")]
    pub min_update_interval_ms: u64,

    /// Maximum queued requests
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Dependency-cycle flush cap
    #[serde(default = "default_dependency_flush_limit")]
    pub dependency_flush_limit: usize,

    /// Enable dirty-check suppression
    #[serde(default = "default_true")]
    pub enable_dirty_check: bool,
}

/// Monitor configuration section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSettings {
    /// Sampling interval in milliseconds
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,

    /// Usage fraction firing warnings with light cleanup
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Usage fraction firing warnings with aggressive cleanup
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    /// Samples kept in history
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Run the leak-analysis timer
    #[serde(default = "default_true")]
    pub enable_leak_detection: bool,

    /// Run the cleanup hook on threshold crossings
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,

    /// Age in seconds past which a referenced object is reported
    #[serde(default = "default_stale_reference_age_secs")]
    pub stale_reference_age_secs: u64,

    /// Age in seconds past which the report escalates
    #[serde(default = "default_stale_reference_escalation_secs")]
    pub stale_reference_escalation_secs: u64,

    /// Idle seconds past which light cleanup drops a reference
    #[serde(default = "default_idle_reference_age_secs")]
    pub idle_reference_age_secs: u64,
}

// Default value functions for serde

fn default_cache_max_entries() -> usize {
    500
}
fn default_cache_ttl_ms() -> u64 {
    300_000
}
fn default_pool_initial_size() -> usize {
    10
}
fn default_pool_max_size() -> usize {
    100
}
fn default_pool_growth_factor() -> f64 {
    1.5
}
fn default_pool_shrink_threshold() -> f64 {
    0.3
}
fn default_max_batch_size() -> usize {
    10
}
fn default_frame_budget_us() -> u64 {
    16_670
}
fn default_min_update_interval_ms() -> u64 {
    16
}
fn default_max_queue_size() -> usize {
    1000
}
fn default_dependency_flush_limit() -> usize {
    100
}
fn default_sampling_interval_ms() -> u64 {
    5000
}
fn default_warning_threshold() -> f64 {
    0.8
}
fn default_critical_threshold() -> f64 {
    0.95
}
fn default_history_cap() -> usize {
    100
}
fn default_stale_reference_age_secs() -> u64 {
    600
}
fn default_stale_reference_escalation_secs() -> u64 {
    1800
}
fn default_idle_reference_age_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            ttl_ms: default_cache_ttl_ms(),
            enable_lru: true,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            initial_size: default_pool_initial_size(),
            max_size: default_pool_max_size(),
            growth_factor: default_pool_growth_factor(),
            shrink_threshold: default_pool_shrink_threshold(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            frame_budget_us: default_frame_budget_us(),
            min_update_interval_ms: default_min_update_interval_ms(),
            max_queue_size: default_max_queue_size(),
            dependency_flush_limit: default_dependency_flush_limit(),
            enable_dirty_check: true,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval_ms(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            history_cap: default_history_cap(),
            enable_leak_detection: true,
            auto_cleanup: true,
            stale_reference_age_secs: default_stale_reference_age_secs(),
            stale_reference_escalation_secs: default_stale_reference_escalation_secs(),
            idle_reference_age_secs: default_idle_reference_age_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Configuration(ConfigError::Load(format!(
                "{}: {}",
                path.as_ref().display(),
                e
            )))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| Error::Configuration(ConfigError::Load(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section by building its typed configuration
    pub fn validate(&self) -> Result<()> {
        self.cache_config().validate()?;
        self.pool_config().validate()?;
        self.scheduler_config().validate()?;
        self.monitor_config().validate()?;
        Ok(())
    }

    /// Convert to the typed cache configuration
    pub fn cache_config(&self) -> CacheConfig {
        let mut config = CacheConfig::default()
            .with_max_entries(self.cache.max_entries)
            .with_ttl(Duration::from_millis(self.cache.ttl_ms));
        if !self.cache.enable_lru {
            config = config.without_lru();
        }
        config
    }

    /// Convert to the typed pool configuration
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            initial_size: self.pool.initial_size,
            max_size: self.pool.max_size,
            growth_factor: self.pool.growth_factor,
            shrink_threshold: self.pool.shrink_threshold,
        }
    }

    /// Convert to the typed scheduler configuration
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_batch_size: self.scheduler.max_batch_size,
            frame_budget: Duration::from_micros(self.scheduler.frame_budget_us),
            min_update_interval: Duration::from_millis(self.scheduler.min_update_interval_ms),
            max_queue_size: self.scheduler.max_queue_size,
            dependency_flush_limit: self.scheduler.dependency_flush_limit,
            enable_dirty_check: self.scheduler.enable_dirty_check,
        }
    }

    /// Convert to the typed monitor configuration
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            sampling_interval: Duration::from_millis(self.monitor.sampling_interval_ms),
            warning_threshold: self.monitor.warning_threshold,
            critical_threshold: self.monitor.critical_threshold,
            history_cap: self.monitor.history_cap,
            enable_leak_detection: self.monitor.enable_leak_detection,
            auto_cleanup: self.monitor.auto_cleanup,
            stale_reference_age: Duration::from_secs(self.monitor.stale_reference_age_secs),
            stale_reference_escalation: Duration::from_secs(
                self.monitor.stale_reference_escalation_secs,
            ),
            idle_reference_age: Duration::from_secs(self.monitor.idle_reference_age_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.scheduler.max_batch_size, 10);
        assert!((config.monitor.warning_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [cache]
            max_entries = 64

            [scheduler]
            max_batch_size = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.max_entries, 64);
        assert_eq!(config.cache.ttl_ms, 300_000);
        assert_eq!(config.scheduler.max_batch_size, 5);
        assert_eq!(config.pool.max_size, 100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = Config::from_toml(
            r#"
            [pool]
            growth_factor = 0.5
            "#,
        );
        assert!(result.is_err());

        let result = Config::from_toml(
            r#"
            [cache]
            max_entries = 0
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(Config::from_toml("cache = not toml").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.toml");
        std::fs::write(&path, "[monitor]\nsampling_interval_ms = 1000\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.monitor.sampling_interval_ms, 1000);
        assert_eq!(
            config.monitor_config().sampling_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = Config::load("/nonexistent/perf.toml").unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_duration_conversions() {
        let config = Config::default();
        assert_eq!(
            config.scheduler_config().frame_budget,
            Duration::from_micros(16_670)
        );
        assert_eq!(config.cache_config().ttl, Duration::from_secs(300));
    }
}
