//! Cache Sweep Task
//!
//! Background task that periodically removes expired keys and, for entries first
//! seen too long ago, runs the retention sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheManager;
use crate::config::CacheConfig;
use crate::error::Result;

// == Sweep Policy ==
/// What a sweep pass removes and how often it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPolicy {
    /// Pause between passes
    pub interval: Duration,
    /// Remove keys older than this TTL
    pub expiry_ttl: Option<Duration>,
    /// Remove entries first seen more than this many days ago
    pub retention_days: Option<u32>,
}

impl SweepPolicy {
    /// Builds the policy described by `config`, or `None` when no sweep is configured.
    ///
    /// A zero TTL or retention window disables that half of the sweep.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if config.sweep_interval == 0 {
            return None;
        }

        let policy = Self {
            interval: Duration::from_secs(config.sweep_interval),
            expiry_ttl: (config.expiry_ttl > 0).then(|| Duration::from_secs(config.expiry_ttl)),
            retention_days: (config.retention_days > 0).then_some(config.retention_days),
        };
        policy.has_work().then_some(policy)
    }

    fn has_work(&self) -> bool {
        self.expiry_ttl.is_some() || self.retention_days.is_some()
    }
}

// == Sweep Report ==
/// Entries removed by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys removed for exceeding the expiry TTL
    pub expired: usize,
    /// Entries removed by the retention sweep
    pub retired: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired + self.retired
    }
}

/// Runs one sweep pass synchronously.
pub fn run_sweep(cache: &CacheManager, policy: &SweepPolicy) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    if let Some(ttl) = policy.expiry_ttl {
        report.expired = cache.cleanup_expired_keys(ttl)?;
    }
    if let Some(days) = policy.retention_days {
        report.retired = cache.cleanup_old_entries(days)?;
    }
    Ok(report)
}

/// Spawns a background task that periodically sweeps the cache.
///
/// The task sleeps for `policy.interval` between passes. Cache calls are synchronous,
/// so each pass runs on the blocking thread pool. A failed pass is logged and the
/// loop carries on with the next one.
///
/// # Returns
/// A JoinHandle for the spawned task; abort it to stop sweeping.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheManager::persistent("cache.db")?);
/// let policy = SweepPolicy {
///     interval: Duration::from_secs(60),
///     expiry_ttl: Some(Duration::from_secs(3600)),
///     retention_days: Some(30),
/// };
/// let sweep_handle = spawn_sweep_task(cache.clone(), policy);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<CacheManager>, policy: SweepPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = policy.interval.as_secs_f64(),
            expiry_ttl = ?policy.expiry_ttl,
            retention_days = ?policy.retention_days,
            "Starting cache sweep task"
        );

        loop {
            tokio::time::sleep(policy.interval).await;

            let pass_cache = Arc::clone(&cache);
            let pass_policy = policy.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_sweep(&pass_cache, &pass_policy)).await;

            match outcome {
                Ok(Ok(report)) if report.total() > 0 => {
                    info!(
                        expired = report.expired,
                        retired = report.retired,
                        "Cache sweep removed entries"
                    );
                }
                Ok(Ok(_)) => debug!("Cache sweep: nothing to remove"),
                Ok(Err(e)) => warn!(error = %e, "Cache sweep failed"),
                Err(e) => warn!(error = %e, "Cache sweep pass did not complete"),
            }
        }
    })
}
