//! Common utilities for integration tests
//!
//! This module provides shared test infrastructure including:
//! - A fault-injecting store wrapper
//! - Manager setup helpers
//! - Test key and directory generators

#![allow(dead_code)]

use async_trait::async_trait;
use fallback_cache::{
    BackendStats, FallbackCacheManager, FallbackConfig, MemoryStore, Record, StoreAdapter,
    StoreError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Kind of failure a `FlakyStore` injects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Connection,
    Timeout,
    Backend,
    Serialization,
}

impl Failure {
    fn to_error(self) -> StoreError {
        match self {
            Self::Connection => StoreError::Connection("connection refused (injected)".into()),
            Self::Timeout => StoreError::Timeout(Duration::from_millis(50)),
            Self::Backend => StoreError::Backend("write rejected (injected)".into()),
            Self::Serialization => StoreError::Serialization("cannot encode (injected)".into()),
        }
    }
}

/// In-memory store that can be switched into a failing mode
///
/// - `set_failure(Some(..))` fails every call
/// - `reject_key(..)` fails only stores for that key
pub struct FlakyStore {
    inner: MemoryStore,
    failure: Mutex<Option<Failure>>,
    rejected_keys: Mutex<HashSet<String>>,
    store_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn healthy() -> Self {
        Self {
            inner: MemoryStore::new(),
            failure: Mutex::new(None),
            rejected_keys: Mutex::new(HashSet::new()),
            store_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn down() -> Self {
        let store = Self::healthy();
        store.set_failure(Some(Failure::Connection));
        store
    }

    pub fn set_failure(&self, failure: Option<Failure>) {
        *self.failure.lock() = failure;
    }

    pub fn go_down(&self) {
        self.set_failure(Some(Failure::Connection));
    }

    pub fn come_up(&self) {
        self.set_failure(None);
    }

    pub fn reject_key(&self, key: &str) {
        self.rejected_keys.lock().insert(key.to_string());
    }

    pub fn accept_key(&self, key: &str) {
        self.rejected_keys.lock().remove(key);
    }

    /// Direct access to the stored data, bypassing failure injection
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn store_calls(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        match *self.failure.lock() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StoreAdapter for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn store(&self, record: &Record) -> Result<String, StoreError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if self.rejected_keys.lock().contains(&record.key) {
            return Err(Failure::Backend.to_error());
        }
        self.inner.store(record).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.clear().await
    }

    async fn stats(&self) -> BackendStats {
        let mut stats = self.inner.stats().await;
        stats.name = self.name().to_string();
        stats
    }

    fn name(&self) -> &'static str {
        "Flaky"
    }
}

/// Manager wired to two fault-injecting stores
pub struct Harness {
    pub primary: Arc<FlakyStore>,
    pub secondary: Arc<FlakyStore>,
    pub manager: Arc<FallbackCacheManager>,
}

/// Build a manager with a healthy Primary and Secondary
pub fn harness(config: FallbackConfig) -> Harness {
    let primary = Arc::new(FlakyStore::healthy());
    let secondary = Arc::new(FlakyStore::healthy());
    let manager = Arc::new(FallbackCacheManager::new(
        Arc::clone(&primary) as Arc<dyn StoreAdapter>,
        Arc::clone(&secondary) as Arc<dyn StoreAdapter>,
        config,
    ));
    Harness {
        primary,
        secondary,
        manager,
    }
}

/// Config with retries and opportunistic drains allowed on every call
pub fn eager_config() -> FallbackConfig {
    FallbackConfig::default().with_retry_interval(Duration::ZERO)
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Fresh, empty directory under the system temp dir
pub fn temp_cache_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fallback-cache-test-{}-{}", name, uuid::Uuid::new_v4()))
}

/// Payload bytes of a record, for concise assertions
pub fn payload_bytes(record: &Record) -> Vec<u8> {
    match &record.payload {
        fallback_cache::Payload::Bytes(bytes) => bytes.clone(),
        fallback_cache::Payload::Document(value) => value.to_string().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = test_key("user");
        let key2 = test_key("user");
        assert_ne!(key1, key2, "Keys should be unique");
        assert!(key1.starts_with("test_user_"));
    }
}
