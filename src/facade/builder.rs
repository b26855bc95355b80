//! Facade builder
//!
//! Assembles and wires the four leaf components behind a single seam:
//! configuration is validated up front, the host capability is injected with
//! a no-op default, and the monitor's cleanup hook is connected to the cache
//! sweep and pool maintenance.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::cache::{CacheConfig, CacheStore};
use crate::config::Config;
use crate::error::Result;
use crate::host::{HostEnvironment, NoopHost};
use crate::metrics;
use crate::monitor::{CleanupLevel, MemoryMonitor, WarningLevel};
use crate::pool::{ChangeResultRecord, ObjectPool, StatModifierRecord, UiBatchRecord};
use crate::scheduler::UpdateScheduler;
use crate::types::CacheCategory;

use super::PerformanceFacade;

/// Builder for a [`PerformanceFacade`]
///
/// # Example
///
/// ```rust
/// use progression_perf::facade::FacadeBuilder;
///
/// let facade = FacadeBuilder::new().build().unwrap();
/// assert!(facade.metrics().cache.total_entries == 0);
/// ```
pub struct FacadeBuilder {
    config: Config,
    host: Option<Arc<dyn HostEnvironment>>,
    cache_overrides: HashMap<CacheCategory, CacheConfig>,
}

impl FacadeBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            host: None,
            cache_overrides: HashMap::new(),
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Inject the host environment capability.
    ///
    /// Defaults to [`NoopHost`]: memory queries report zero and explicit
    /// reclamation is unavailable, both degrading gracefully.
    pub fn with_host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
        self.host = Some(host);
        self
    }

    /// Override the cache configuration for one category
    pub fn with_category_cache_config(
        mut self,
        category: CacheCategory,
        config: CacheConfig,
    ) -> Self {
        self.cache_overrides.insert(category, config);
        self
    }

    /// Validate the configuration, build every component, and wire them
    /// together.
    pub fn build(self) -> Result<PerformanceFacade> {
        self.config.validate()?;
        let host: Arc<dyn HostEnvironment> = self.host.unwrap_or_else(|| Arc::new(NoopHost));

        let cache = Arc::new(RwLock::new(CacheStore::with_overrides(
            self.config.cache_config(),
            self.cache_overrides,
        )?));

        let pool_config = self.config.pool_config();
        let stat_pool = Arc::new(Mutex::new(ObjectPool::<StatModifierRecord>::new(
            pool_config.clone(),
        )?));
        let change_pool = Arc::new(Mutex::new(ObjectPool::<ChangeResultRecord>::new(
            pool_config.clone(),
        )?));
        let ui_pool = Arc::new(Mutex::new(ObjectPool::<UiBatchRecord>::new(pool_config)?));

        let scheduler = Mutex::new(UpdateScheduler::new(self.config.scheduler_config())?);

        let monitor = Arc::new(MemoryMonitor::new(
            self.config.monitor_config(),
            host.clone(),
        )?);

        // Aggressive cleanup sweeps the caches and shrinks over-grown pools;
        // light cleanup is handled inside the monitor (idle references only)
        {
            let cache = cache.clone();
            let stat_pool = stat_pool.clone();
            let change_pool = change_pool.clone();
            let ui_pool = ui_pool.clone();
            monitor.set_cleanup_hook(Box::new(move |level| {
                if level == CleanupLevel::Aggressive {
                    let expired = cache.write().cleanup_expired();
                    let shrunk = stat_pool.lock().maintenance()
                        + change_pool.lock().maintenance()
                        + ui_pool.lock().maintenance();
                    debug!(expired, shrunk, "Aggressive cleanup hook ran");
                }
            }));
        }

        // Threshold warnings also feed the Prometheus counters
        monitor.on_warning(Box::new(|warning| {
            let level = match warning.level {
                WarningLevel::Warning => "warning",
                WarningLevel::Critical => "critical",
            };
            metrics::record_memory_warning(level);
        }));

        metrics::init();

        Ok(PerformanceFacade {
            cache,
            stat_pool,
            change_pool,
            ui_pool,
            scheduler,
            monitor,
            host,
            compute_tracker: Mutex::new((Duration::ZERO, 0)),
            started_at: Instant::now(),
            disposed: AtomicBool::new(false),
        })
    }
}

impl Default for FacadeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
