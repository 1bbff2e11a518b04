//! Memory Store - Concurrent In-Memory Backend
//!
//! A lightweight in-process store using `DashMap` for concurrent access.
//! Useful as a Secondary in ephemeral deployments and as a test double.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::record::Record;

/// Concurrent in-memory store using `DashMap`
///
/// **Use Case**: tests, single-process setups that accept losing data on restart
///
/// **Features**:
/// - Lock-free concurrent reads/writes
/// - Never fails (every operation returns `Ok`)
/// - Hit/miss/store counters
///
/// **Limitations**:
/// - Not durable; do not use as the Secondary when records must survive
///   a restart
/// - Unbounded growth
///
/// **Example**:
/// ```rust
/// use fallback_cache::{MemoryStore, Record, StoreAdapter};
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = MemoryStore::new();
/// let record = Record::bytes("doc:1", b"hello".to_vec());
///
/// store.store(&record).await?;
/// assert_eq!(store.get("doc:1").await?, Some(record));
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    /// Concurrent `HashMap`
    map: Arc<DashMap<String, Record>>,
    /// Hit counter
    hits: Arc<AtomicU64>,
    /// Miss counter
    misses: Arc<AtomicU64>,
    /// Store counter
    stores: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create new empty memory store
    pub fn new() -> Self {
        info!("Initializing Memory Store (concurrent HashMap)");

        Self {
            map: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            stores: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get current number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keys currently held, in no particular order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Trait Implementations =====

use crate::traits::{BackendStats, StoreAdapter};
use async_trait::async_trait;

/// Implement `StoreAdapter` trait for `MemoryStore`
#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        if let Some(entry) = self.map.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(Some(entry.value().clone()))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    async fn store(&self, record: &Record) -> Result<String, StoreError> {
        self.map.insert(record.key.clone(), record.clone());
        self.stores.fetch_add(1, Ordering::Relaxed);
        debug!(key = %record.key, "[Memory] Stored record");
        Ok(record.key.clone())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.map.contains_key(key))
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let removed = self.map.len();
        self.map.clear();
        debug!(count = removed, "[Memory] Cleared records");
        Ok(removed)
    }

    async fn stats(&self) -> BackendStats {
        BackendStats {
            name: self.name().to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            errors: 0,
            entries: Some(self.map.len() as u64),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
