//! Sync Queue - Pending Primary Writes
//!
//! Bounded FIFO of writes that could not reach the Primary store, with retry
//! accounting and overflow eviction.
//!
//! # Locking
//!
//! One `parking_lot::Mutex` guards the deque and the dropped counter. It is
//! held only to push, pop or copy; Primary calls during a drain happen with
//! the lock released.
//!
//! # Drain Semantics
//!
//! ```text
//! pop front ──► Primary.store ──► ok ─────────────────────────► synced
//!                      │
//!                      ├─► serialization error ───────────────► failed (dropped)
//!                      ├─► retry_count >= max_retries ────────► failed (dropped)
//!                      └─► retry_count < max_retries ─────────► requeued
//!                                                  (connectivity error stops the batch)
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RequeuePolicy;
use crate::record::Record;
use crate::traits::StoreAdapter;

/// Operation a queue item replays against Primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOperation {
    /// Upsert the record
    Store,
}

/// A write waiting to be replayed against Primary
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Unique id, for correlating log lines about the same item
    pub id: Uuid,
    /// Record to write
    pub record: Record,
    /// When the item entered the queue
    pub enqueued_at: Instant,
    /// Failed drain attempts so far
    pub retry_count: u32,
    /// Operation to replay
    pub operation: QueueOperation,
}

impl QueueItem {
    fn new(record: Record) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            enqueued_at: Instant::now(),
            retry_count: 0,
            operation: QueueOperation::Store,
        }
    }
}

/// Outcome counts of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainResult {
    /// Items written to Primary and removed
    pub synced: usize,
    /// Items dropped permanently (retries exhausted or unserializable)
    pub failed: usize,
    /// Items put back for a later drain
    pub requeued: usize,
}

impl DrainResult {
    /// Whether the drain hit any failure at all
    #[must_use]
    pub fn had_failures(&self) -> bool {
        self.failed > 0 || self.requeued > 0
    }

    /// Whether the drain touched no item
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.synced == 0 && self.failed == 0 && self.requeued == 0
    }
}

/// Read-only view of a pending item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    /// Queue item id
    pub id: Uuid,
    /// Record key
    pub key: String,
    /// Failed drain attempts so far
    pub retry_count: u32,
    /// Time spent in the queue
    pub age: Duration,
}

/// Point-in-time snapshot of the queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueStats {
    /// Items currently pending
    pub queue_size: usize,
    /// Configured capacity
    pub max_size: usize,
    /// Age of the longest-waiting item
    pub oldest_age: Option<Duration>,
    /// Age of the most recently enqueued item
    pub newest_age: Option<Duration>,
    /// Items evicted by overflow since creation
    pub dropped_total: u64,
    /// Items synced to Primary since creation
    pub synced_total: u64,
    /// Items dropped after failing permanently since creation
    pub failed_total: u64,
}

struct QueueState {
    items: VecDeque<QueueItem>,
    dropped_total: u64,
}

/// Bounded, thread-safe queue of writes pending replay against Primary
///
/// Owned by one [`FallbackCacheManager`](crate::FallbackCacheManager); there
/// is no process-wide instance, so independent managers never share a backlog.
pub struct SyncQueue {
    /// Deque and overflow counter
    state: Mutex<QueueState>,
    /// Capacity (at least 1)
    max_size: usize,
    /// Reinsertion policy for failed items
    policy: RequeuePolicy,
    /// Lifetime synced counter
    synced_total: AtomicU64,
    /// Lifetime permanent-failure counter
    failed_total: AtomicU64,
}

impl SyncQueue {
    /// Create an empty queue holding at most `max_size` items
    pub fn new(max_size: usize, policy: RequeuePolicy) -> Self {
        let max_size = max_size.max(1);
        info!(max_size, policy = ?policy, "Initializing Sync Queue");

        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(max_size.min(1024)),
                dropped_total: 0,
            }),
            max_size,
            policy,
            synced_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
        }
    }

    /// Queue `record` for replay against Primary
    ///
    /// A pending write for the same key is replaced, since only the latest
    /// version needs to reach Primary. If the pending write is newer than
    /// `record`, `record` is ignored and `false` is returned.
    ///
    /// At capacity the oldest item is evicted first. Never fails; evictions
    /// are visible only through `stats().dropped_total`.
    pub fn enqueue(&self, record: Record) -> bool {
        let item = QueueItem::new(record);
        let key = item.record.key.clone();

        let (evicted, size) = {
            let mut state = self.state.lock();
            if let Some(pos) = state.items.iter().position(|pending| pending.record.key == key) {
                let newer_pending = state
                    .items
                    .get(pos)
                    .is_some_and(|pending| !item.record.supersedes(&pending.record));
                if newer_pending {
                    drop(state);
                    debug!(key = %key, "Newer write already queued, ignoring stale record");
                    return false;
                }
                state.items.remove(pos);
            }
            let evicted = Self::evict_overflow(&mut state, self.max_size.saturating_sub(1));
            state.items.push_back(item);
            (evicted, state.items.len())
        };

        for dropped in &evicted {
            warn!(
                key = %dropped.record.key,
                retry_count = dropped.retry_count,
                "Sync queue full, evicted oldest pending write"
            );
        }
        debug!(key = %key, queue_size = size, "Queued write for Primary sync");
        true
    }

    /// Replay up to `batch_size` items against `primary`
    ///
    /// Items are popped one at a time from the front. A connectivity failure
    /// stops the batch after requeueing the failed item. Items requeued
    /// during the batch are reinserted when the batch ends, so one drain
    /// never attempts the same item twice.
    pub async fn drain_batch(
        &self,
        primary: &dyn StoreAdapter,
        batch_size: usize,
        max_retries: u32,
    ) -> DrainResult {
        let mut result = DrainResult::default();
        let mut retry_later: Vec<QueueItem> = Vec::new();

        for _ in 0..batch_size {
            let next = self.state.lock().items.pop_front();
            let Some(mut item) = next else {
                break;
            };

            match primary.store(&item.record).await {
                Ok(_) => {
                    result.synced += 1;
                    debug!(key = %item.record.key, id = %item.id, "Synced queued write to Primary");
                }
                Err(e) if !e.is_retryable() => {
                    result.failed += 1;
                    error!(
                        key = %item.record.key,
                        id = %item.id,
                        error = %e,
                        "Dropping queued write that cannot be serialized"
                    );
                }
                Err(e) if item.retry_count < max_retries => {
                    item.retry_count += 1;
                    result.requeued += 1;
                    let stop = e.is_connectivity();
                    debug!(
                        key = %item.record.key,
                        retry_count = item.retry_count,
                        error = %e,
                        "Queued write failed, will retry"
                    );
                    retry_later.push(item);
                    if stop {
                        debug!("Primary unreachable, stopping drain early");
                        break;
                    }
                }
                Err(e) => {
                    result.failed += 1;
                    error!(
                        key = %item.record.key,
                        id = %item.id,
                        retry_count = item.retry_count,
                        error = %e,
                        "Dropping queued write after exhausting retries"
                    );
                }
            }
        }

        if !retry_later.is_empty() {
            self.requeue(retry_later);
        }

        self.synced_total.fetch_add(result.synced as u64, Ordering::Relaxed);
        self.failed_total.fetch_add(result.failed as u64, Ordering::Relaxed);

        if !result.is_empty() {
            info!(
                synced = result.synced,
                failed = result.failed,
                requeued = result.requeued,
                remaining = self.len(),
                "Sync queue drain finished"
            );
        }
        result
    }

    /// Snapshot of queue size, ages and lifetime counters
    pub fn stats(&self) -> SyncQueueStats {
        let state = self.state.lock();
        let now = Instant::now();
        let ages = state.items.iter().map(|item| now.saturating_duration_since(item.enqueued_at));

        SyncQueueStats {
            queue_size: state.items.len(),
            max_size: self.max_size,
            oldest_age: ages.clone().max(),
            newest_age: ages.min(),
            dropped_total: state.dropped_total,
            synced_total: self.synced_total.load(Ordering::Relaxed),
            failed_total: self.failed_total.load(Ordering::Relaxed),
        }
    }

    /// The next `n` items a drain would attempt, without removing them
    pub fn peek(&self, n: usize) -> Vec<PendingItem> {
        let state = self.state.lock();
        state
            .items
            .iter()
            .take(n)
            .map(|item| PendingItem {
                id: item.id,
                key: item.record.key.clone(),
                retry_count: item.retry_count,
                age: item.enqueued_at.elapsed(),
            })
            .collect()
    }

    /// Whether a write for `key` is pending
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().items.iter().any(|item| item.record.key == key)
    }

    /// Remove pending writes for `record.key` that `record` supersedes
    ///
    /// Called after `record` reached Primary directly, so an older queued
    /// version cannot overwrite it on the next drain.
    pub fn discard_superseded(&self, record: &Record) -> usize {
        let mut state = self.state.lock();
        let before = state.items.len();
        state
            .items
            .retain(|pending| pending.record.key != record.key || !record.supersedes(&pending.record));
        before - state.items.len()
    }

    /// Number of pending items
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Discard every pending item, returning how many were removed
    ///
    /// Administrative; discarded items are not counted as dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.items.len();
        state.items.clear();
        removed
    }

    fn requeue(&self, items: Vec<QueueItem>) {
        let evicted = {
            let mut state = self.state.lock();
            match self.policy {
                RequeuePolicy::Front => {
                    for item in items.into_iter().rev() {
                        state.items.push_front(item);
                    }
                }
                RequeuePolicy::Back => state.items.extend(items),
            }
            Self::evict_overflow(&mut state, self.max_size)
        };

        for dropped in &evicted {
            warn!(
                key = %dropped.record.key,
                retry_count = dropped.retry_count,
                "Sync queue full after requeue, evicted oldest pending write"
            );
        }
    }

    /// Pop from the front until at most `limit` items remain
    fn evict_overflow(state: &mut QueueState, limit: usize) -> Vec<QueueItem> {
        let mut evicted = Vec::new();
        while state.items.len() > limit {
            match state.items.pop_front() {
                Some(item) => {
                    state.dropped_total += 1;
                    evicted.push(item);
                }
                None => break,
            }
        }
        evicted
    }
}
