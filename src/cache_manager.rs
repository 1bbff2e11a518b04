//! Fallback Cache Manager - Unified Cache Operations
//!
//! Manages reads and writes across the Primary (network) and Secondary
//! (local) stores, tracks Primary health, and replays writes that missed
//! Primary once it recovers.
//!
//! ```text
//! cache(record)                     get_cached(key)
//!   │                                 │
//!   ├─► Secondary.store (always)      ├─► Primary.get ── hit ──► mirror to Secondary
//!   │                                 │        │                  + opportunistic drain
//!   └─► Primary.store                 │   miss / error
//!          │ ok ──► opportunistic     │        ▼
//!          │        drain             └─► Secondary.get
//!          └ error ──► SyncQueue
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::availability::{Availability, AvailabilityTracker};
use crate::config::FallbackConfig;
use crate::error::{CacheError, StoreError};
use crate::record::Record;
use crate::sync_queue::{DrainResult, PendingItem, SyncQueue, SyncQueueStats};
use crate::traits::{BackendStats, StoreAdapter};

/// Batch size used by administrative drains when the caller has no preference
pub const DEFAULT_FORCE_SYNC_BATCH: usize = 50;

/// Request counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestStats {
    pub total_requests: u64,
    pub primary_hits: u64,
    pub secondary_hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// Combined health snapshot of the fallback cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Current belief about Primary reachability
    pub availability: Availability,
    /// Time since the last recovery drain, if any ran
    pub last_drain_age: Option<Duration>,
    /// Read path counters
    pub requests: RequestStats,
    /// Primary store counters
    pub primary: BackendStats,
    /// Secondary store counters
    pub secondary: BackendStats,
    /// Pending-write queue snapshot
    pub sync_queue: SyncQueueStats,
    /// Next few pending writes (diagnostic only)
    pub pending: Vec<PendingItem>,
}

/// Result of clearing one tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierClear {
    /// Records removed, when the clear succeeded
    pub cleared: Option<usize>,
    /// Error message, when the clear failed
    pub error: Option<String>,
}

impl From<Result<usize, StoreError>> for TierClear {
    fn from(result: Result<usize, StoreError>) -> Self {
        match result {
            Ok(cleared) => Self { cleared: Some(cleared), error: None },
            Err(e) => Self { cleared: None, error: Some(e.to_string()) },
        }
    }
}

/// Per-tier outcome of [`FallbackCacheManager::clear_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub primary: TierClear,
    pub secondary: TierClear,
    /// Pending writes discarded from the sync queue
    pub queue_cleared: usize,
}

/// Fallback Cache Manager - single entry point for cache reads and writes
///
/// Hides the Primary/Secondary split from callers. No method fails because
/// Primary is down; only a failure of both tiers is reported.
pub struct FallbackCacheManager {
    /// Network store, system of record when reachable
    primary: Arc<dyn StoreAdapter>,
    /// Local store, write-through backstop and fallback read path
    secondary: Arc<dyn StoreAdapter>,
    /// Writes waiting for Primary
    sync_queue: SyncQueue,
    /// Primary reachability belief
    availability: AvailabilityTracker,
    /// Configuration
    config: FallbackConfig,
    /// Statistics
    total_requests: AtomicU64,
    primary_hits: AtomicU64,
    secondary_hits: AtomicU64,
    misses: AtomicU64,
}

impl FallbackCacheManager {
    /// Create a manager over the given stores
    pub fn new(
        primary: Arc<dyn StoreAdapter>,
        secondary: Arc<dyn StoreAdapter>,
        config: FallbackConfig,
    ) -> Self {
        info!(
            primary = primary.name(),
            secondary = secondary.name(),
            max_queue_size = config.max_queue_size,
            max_retries = config.max_retries,
            retry_interval_secs = config.retry_interval.as_secs(),
            "Initializing Fallback Cache Manager"
        );

        Self {
            sync_queue: SyncQueue::new(config.max_queue_size, config.requeue_policy),
            availability: AvailabilityTracker::new(config.retry_interval),
            primary,
            secondary,
            config,
            total_requests: AtomicU64::new(0),
            primary_hits: AtomicU64::new(0),
            secondary_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a record, Primary first, then Secondary
    ///
    /// A Primary hit is mirrored into Secondary and triggers an opportunistic
    /// drain. The Secondary copy wins when a newer write for the key is still
    /// waiting in the sync queue, or when it is newer than Primary's record
    /// (it is then queued again so Primary catches up).
    ///
    /// # Returns
    /// * `Ok(Some(record))` - Found in either tier
    /// * `Ok(None)` - Found in neither tier
    ///
    /// # Errors
    ///
    /// [`CacheError::ReadFailed`] if Primary did not answer and Secondary failed.
    pub async fn get_cached(&self, key: &str) -> Result<Option<Record>, CacheError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut primary_answered = false;
        let mut primary_copy: Option<Record> = None;

        if self.availability.should_attempt() {
            match self.primary.get(key).await {
                Ok(Some(record)) => {
                    self.availability.mark_available();
                    primary_answered = true;

                    if self.sync_queue.contains(key) {
                        debug!(key = %key, "Newer write pending for Primary, preferring Secondary copy");
                        primary_copy = Some(record);
                    } else {
                        let record = self.reconcile_primary_hit(record).await;
                        self.opportunistic_drain().await;
                        return Ok(Some(record));
                    }
                }
                Ok(None) => {
                    self.availability.mark_available();
                    primary_answered = true;
                }
                Err(e) if e.is_retryable() => {
                    warn!(key = %key, error = %e, "Primary read failed, falling back to Secondary");
                    self.availability.mark_unavailable();
                }
                Err(e) => {
                    error!(key = %key, error = %e, "Primary holds an unreadable record, falling back to Secondary");
                    primary_answered = true;
                }
            }
        }

        match self.secondary.get(key).await {
            Ok(Some(record)) => {
                self.secondary_hits.fetch_add(1, Ordering::Relaxed);
                if primary_answered {
                    self.opportunistic_drain().await;
                }
                Ok(Some(record))
            }
            Ok(None) => match primary_copy {
                Some(record) => {
                    self.primary_hits.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(record))
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            },
            Err(e) if primary_answered => {
                warn!(key = %key, error = %e, "Secondary read failed, using Primary answer");
                if primary_copy.is_some() {
                    self.primary_hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                }
                Ok(primary_copy)
            }
            Err(e) => {
                error!(key = %key, error = %e, "Read failed on both tiers");
                Err(CacheError::ReadFailed { key: key.to_string(), secondary: e })
            }
        }
    }

    /// Store a record, Secondary first, then Primary
    ///
    /// If Primary fails or is believed down, the record is queued for a
    /// later drain and the key is still returned: the write is durable in
    /// Secondary.
    ///
    /// # Errors
    ///
    /// [`CacheError::WriteFailed`] if Secondary failed and Primary did not
    /// accept the write either.
    pub async fn cache(&self, record: Record) -> Result<String, CacheError> {
        let key = record.key.clone();

        let secondary_error = match self.secondary.store(&record).await {
            Ok(_) => None,
            Err(e) => {
                error!(key = %key, error = %e, "Secondary write failed");
                Some(e)
            }
        };

        let mut primary_error = None;
        if self.availability.should_attempt() {
            match self.primary.store(&record).await {
                Ok(_) => {
                    self.availability.mark_available();
                    // An older queued write must not overwrite this one later
                    self.sync_queue.discard_superseded(&record);
                    debug!(key = %key, "Cached record in Primary");
                    self.opportunistic_drain().await;
                    return Ok(key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Primary write failed");
                    if e.is_retryable() {
                        self.availability.mark_unavailable();
                    }
                    primary_error = Some(e);
                }
            }
        }

        if let Some(secondary) = secondary_error {
            return Err(CacheError::WriteFailed { key, secondary, primary: primary_error });
        }

        match &primary_error {
            Some(e) if !e.is_retryable() => {
                error!(key = %key, error = %e, "Record cannot be encoded for Primary, kept in Secondary only");
            }
            _ => {
                self.sync_queue.enqueue(record);
            }
        }
        Ok(key)
    }

    /// Check whether a key is cached in either tier
    ///
    /// Never fails; any store error counts as "not present" for that tier.
    pub async fn cache_exists(&self, key: &str) -> bool {
        if self.availability.should_attempt() {
            match self.primary.exists(key).await {
                Ok(true) => {
                    self.availability.mark_available();
                    return true;
                }
                Ok(false) => self.availability.mark_available(),
                Err(e) => {
                    warn!(key = %key, error = %e, "Primary exists check failed");
                    if e.is_retryable() {
                        self.availability.mark_unavailable();
                    }
                }
            }
        }

        self.secondary.exists(key).await.unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Secondary exists check failed");
            false
        })
    }

    /// Drain the sync queue now, ignoring the rate limiter
    ///
    /// Updates availability from the outcome: any failure marks Primary
    /// unavailable, a clean drain that synced something marks it available.
    pub async fn force_sync(&self, batch_size: usize) -> DrainResult {
        self.availability.note_drain();
        if self.sync_queue.is_empty() {
            return DrainResult::default();
        }

        info!(batch_size, pending = self.sync_queue.len(), "Forcing sync queue drain");
        let result = self
            .sync_queue
            .drain_batch(self.primary.as_ref(), batch_size, self.config.max_retries)
            .await;
        self.apply_drain_result(&result);
        result
    }

    /// Combined health snapshot
    pub async fn stats(&self) -> ManagerStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let primary_hits = self.primary_hits.load(Ordering::Relaxed);
        let secondary_hits = self.secondary_hits.load(Ordering::Relaxed);

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total_requests > 0 {
            ((primary_hits + secondary_hits) as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        };

        ManagerStats {
            availability: self.availability.get(),
            last_drain_age: self.availability.last_drain_age(),
            requests: RequestStats {
                total_requests,
                primary_hits,
                secondary_hits,
                misses: self.misses.load(Ordering::Relaxed),
                hit_rate,
            },
            primary: self.primary.stats().await,
            secondary: self.secondary.stats().await,
            sync_queue: self.sync_queue.stats(),
            pending: self.sync_queue.peek(self.config.pending_preview),
        }
    }

    /// Wipe both tiers and the pending-write queue
    ///
    /// Destructive, for operational use only. Never fails; each tier's
    /// outcome is reported separately.
    pub async fn clear_all(&self) -> ClearReport {
        warn!("Clearing all cache tiers");

        let queue_cleared = self.sync_queue.clear();
        let report = ClearReport {
            primary: self.primary.clear().await.into(),
            secondary: self.secondary.clear().await.into(),
            queue_cleared,
        };

        info!(
            primary = ?report.primary.cleared,
            secondary = ?report.secondary.cleared,
            queue_cleared,
            "Cache tiers cleared"
        );
        report
    }

    /// Current belief about Primary reachability
    pub fn availability(&self) -> Availability {
        self.availability.get()
    }

    /// Pending-write queue (diagnostics)
    pub fn sync_queue(&self) -> &SyncQueue {
        &self.sync_queue
    }

    /// Active configuration
    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Primary store
    pub fn primary(&self) -> &Arc<dyn StoreAdapter> {
        &self.primary
    }

    /// Secondary store
    pub fn secondary(&self) -> &Arc<dyn StoreAdapter> {
        &self.secondary
    }

    /// Pick the winner between a Primary hit and the Secondary copy
    ///
    /// The Secondary copy can be newer when its queued write was evicted or
    /// dropped before reaching Primary. In that case it is returned and
    /// queued again; otherwise the Primary record is mirrored into Secondary.
    async fn reconcile_primary_hit(&self, record: Record) -> Record {
        let key = record.key.clone();
        match self.secondary.get(&key).await {
            Ok(Some(local)) if local.updated_at > record.updated_at => {
                warn!(
                    key = %key,
                    primary_updated_at = record.updated_at,
                    secondary_updated_at = local.updated_at,
                    "Primary holds a stale version, re-queueing the Secondary copy"
                );
                self.secondary_hits.fetch_add(1, Ordering::Relaxed);
                self.sync_queue.enqueue(local.clone());
                return local;
            }
            Ok(Some(local)) if local.updated_at == record.updated_at => {
                self.primary_hits.fetch_add(1, Ordering::Relaxed);
                return record;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Secondary read failed before mirroring Primary hit");
            }
        }

        self.primary_hits.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.secondary.store(&record).await {
            warn!(key = %key, error = %e, "Failed to mirror Primary hit into Secondary");
        }
        record
    }

    /// Drain one batch if the queue is non-empty and `retry_interval` has passed
    async fn opportunistic_drain(&self) {
        if self.sync_queue.is_empty() || !self.availability.try_begin_drain() {
            return;
        }

        debug!(pending = self.sync_queue.len(), "Running opportunistic sync queue drain");
        let result = self
            .sync_queue
            .drain_batch(
                self.primary.as_ref(),
                self.config.drain_batch_size,
                self.config.max_retries,
            )
            .await;
        self.apply_drain_result(&result);
    }

    fn apply_drain_result(&self, result: &DrainResult) {
        if result.had_failures() {
            self.availability.mark_unavailable();
        } else if result.synced > 0 {
            self.availability.mark_available();
        }
    }
}
