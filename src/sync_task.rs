//! Periodic background drain
//!
//! Request-driven drains only run while callers are active. A `SyncTask`
//! additionally calls [`FallbackCacheManager::force_sync`] on a fixed
//! interval so a quiet process still flushes its backlog once Primary
//! comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache_manager::FallbackCacheManager;

/// Shortest tick the task will run at
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Counters for the background drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTaskStats {
    /// Ticks that found pending writes and ran a drain
    pub runs: u64,
    /// Items synced by this task
    pub synced: u64,
    /// Items dropped permanently by this task
    pub failed: u64,
}

#[derive(Debug, Default)]
struct AtomicSyncTaskStats {
    runs: AtomicU64,
    synced: AtomicU64,
    failed: AtomicU64,
}

impl AtomicSyncTaskStats {
    fn snapshot(&self) -> SyncTaskStats {
        SyncTaskStats {
            runs: self.runs.load(Ordering::Relaxed),
            synced: self.synced.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a spawned periodic drain
///
/// Dropping the handle stops the task.
pub struct SyncTask {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<AtomicSyncTaskStats>,
}

impl SyncTask {
    /// Spawn a task draining up to `batch_size` items every `interval`
    ///
    /// Must be called from within a Tokio runtime. Intervals below one
    /// millisecond, including zero, are raised to one millisecond.
    pub fn spawn(manager: Arc<FallbackCacheManager>, interval: Duration, batch_size: usize) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let stats = Arc::new(AtomicSyncTaskStats::default());
        let task_stats = Arc::clone(&stats);

        info!(interval_ms = interval.as_millis(), batch_size, "Starting background sync task");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.sync_queue().is_empty() {
                            continue;
                        }
                        let result = manager.force_sync(batch_size).await;
                        task_stats.runs.fetch_add(1, Ordering::Relaxed);
                        task_stats.synced.fetch_add(result.synced as u64, Ordering::Relaxed);
                        task_stats.failed.fetch_add(result.failed as u64, Ordering::Relaxed);
                        debug!(
                            synced = result.synced,
                            failed = result.failed,
                            requeued = result.requeued,
                            "Background sync tick"
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Background sync task shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
            shutdown_tx,
            stats,
        }
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> SyncTaskStats {
        self.stats.snapshot()
    }

    /// Signal the task to stop and wait for it to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SyncTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.shutdown_tx.send(());
            handle.abort();
        }
    }
}
