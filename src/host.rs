//! Host environment capabilities
//!
//! The performance layer consumes a few capabilities the host may or may not
//! expose: a process memory query and an explicit reclamation trigger. They
//! are modeled as an injected trait with a no-op default, so the rest of the
//! code never probes for their existence. An absent capability degrades to
//! zeroed readings, never an error.

use std::fs;

use tracing::debug;

/// A point-in-time process memory reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryReading {
    /// Bytes currently used by the process
    pub used_bytes: u64,
    /// Total bytes available to the process
    pub total_bytes: u64,
}

impl MemoryReading {
    /// Used fraction of total, 0.0 when total is unknown
    pub fn usage_percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Capabilities optionally provided by the host environment
pub trait HostEnvironment: Send + Sync {
    /// Query current process memory. `None` means the capability is absent;
    /// the monitor then reports zeroed readings.
    fn memory_usage(&self) -> Option<MemoryReading>;

    /// Ask the host to reclaim memory explicitly. Returns whether the host
    /// acted on the request. The default implementation does nothing.
    fn request_reclaim(&self) -> bool {
        false
    }
}

/// Host with no capabilities; every query degrades gracefully
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl HostEnvironment for NoopHost {
    fn memory_usage(&self) -> Option<MemoryReading> {
        None
    }
}

/// Linux host reading `/proc/self/status` (VmRSS) and `/proc/meminfo`
/// (MemTotal)
///
/// On other platforms, or when the files are unreadable, behaves like
/// [`NoopHost`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcHost;

impl ProcHost {
    fn read_kb_field(contents: &str, field: &str) -> Option<u64> {
        for line in contents.lines() {
            if line.starts_with(field) {
                if let Some(kb_str) = line.split_whitespace().nth(1) {
                    if let Ok(kb) = kb_str.parse::<u64>() {
                        return Some(kb * 1024);
                    }
                }
            }
        }
        None
    }
}

impl HostEnvironment for ProcHost {
    fn memory_usage(&self) -> Option<MemoryReading> {
        let status = fs::read_to_string("/proc/self/status").ok()?;
        let meminfo = fs::read_to_string("/proc/meminfo").ok()?;

        let used_bytes = Self::read_kb_field(&status, "VmRSS:")?;
        let total_bytes = Self::read_kb_field(&meminfo, "MemTotal:")?;

        Some(MemoryReading {
            used_bytes,
            total_bytes,
        })
    }

    fn request_reclaim(&self) -> bool {
        // No portable way to force a reclaim from user space; log the
        // request and report it unhandled
        debug!("Explicit reclaim requested but unavailable on this host");
        false
    }
}
