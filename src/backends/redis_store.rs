//! Redis Store - Network Primary Backend
//!
//! Redis-based durable store reached over the network. This is the default
//! Primary tier of the fallback cache.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::codecs::JsonCodec;
use crate::error::StoreError;
use crate::record::Record;
use crate::traits::CacheCodec;

/// Configuration for `RedisStore`
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Prefix prepended to every record key
    pub namespace: String,
    /// Upper bound for a single Redis call (including reconnect)
    pub op_timeout: Duration,
    /// Optional expiry for stored records (`None` = keep forever)
    pub ttl: Option<Duration>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            namespace: "fallback:".to_string(),
            op_timeout: Duration::from_secs(5),
            ttl: None,
        }
    }
}

/// Redis URL from `REDIS_URL`, defaulting to a local server
#[must_use]
pub fn redis_url_from_env() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Map a Redis error onto the adapter error taxonomy
fn classify(err: &RedisError) -> StoreError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StoreError::Connection(err.to_string())
    } else if err.is_timeout() {
        StoreError::Timeout(Duration::ZERO)
    } else {
        StoreError::Backend(err.to_string())
    }
}

/// TTL in milliseconds for `PSETEX`, never zero
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis store with `ConnectionManager` for automatic reconnection
///
/// This is the default Primary backend, providing:
/// - Shared durable storage across instances
/// - Automatic reconnection via `ConnectionManager`
/// - Lazy connection, so the cache can start while Redis is down
/// - Namespaced keys, so `clear` never touches unrelated data
/// - Pluggable record encoding via [`CacheCodec`]
pub struct RedisStore<C: CacheCodec = JsonCodec> {
    /// Redis client used to (re)establish the connection manager
    client: Client,
    /// Established connection manager, created on first successful use
    conn_manager: Mutex<Option<ConnectionManager>>,
    /// Store configuration
    config: RedisStoreConfig,
    /// Record codec
    codec: C,
    /// Hit counter
    hits: Arc<AtomicU64>,
    /// Miss counter
    misses: Arc<AtomicU64>,
    /// Store counter
    stores: Arc<AtomicU64>,
    /// Error counter
    errors: Arc<AtomicU64>,
}

impl RedisStore<JsonCodec> {
    /// Create new Redis store using `REDIS_URL`, connecting eagerly
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or connection fails.
    pub async fn new() -> Result<Self> {
        Self::with_url(&redis_url_from_env()).await
    }

    /// Create new Redis store with custom URL, connecting eagerly
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., `<redis://localhost:6379>`)
    /// # Errors
    ///
    /// Returns an error if the Redis client cannot be created or the PING fails.
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let store = Self::lazy(redis_url, RedisStoreConfig::default())?;

        let mut conn = store
            .connection()
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to establish Redis connection manager")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis Store connected successfully (ConnectionManager enabled)");
        Ok(store)
    }

    /// Create a Redis store that connects on first use
    ///
    /// Construction succeeds even if Redis is unreachable; the first call
    /// reports a connectivity error instead.
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn lazy(redis_url: &str, config: RedisStoreConfig) -> Result<Self> {
        Self::lazy_with_codec(redis_url, config, JsonCodec)
    }
}

impl<C: CacheCodec> RedisStore<C> {
    /// Create a lazily connecting Redis store with a custom codec
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn lazy_with_codec(redis_url: &str, config: RedisStoreConfig, codec: C) -> Result<Self> {
        info!(
            redis_url = %redis_url,
            namespace = %config.namespace,
            codec = codec.name(),
            "Initializing Redis Store"
        );

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        Ok(Self {
            client,
            conn_manager: Mutex::new(None),
            config,
            codec,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            stores: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.config.namespace)
    }

    /// Get the shared connection manager, creating it if needed
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let cached = self.conn_manager.lock().clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        let timeout = self.config.op_timeout;
        let conn = match tokio::time::timeout(timeout, ConnectionManager::new(self.client.clone())).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(StoreError::Connection(e.to_string())),
            Err(_) => return Err(StoreError::Timeout(timeout)),
        };

        debug!("[Redis] Connection manager established");
        *self.conn_manager.lock() = Some(conn.clone());
        Ok(conn)
    }

    /// Run one Redis call under the operation timeout
    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        let timeout = self.config.op_timeout;
        let result = match tokio::time::timeout(timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => match classify(&e) {
                StoreError::Timeout(_) => Err(StoreError::Timeout(timeout)),
                other => Err(other),
            },
            Err(_) => Err(StoreError::Timeout(timeout)),
        };

        if let Err(e) = &result {
            self.errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "[Redis] Operation failed");
        }
        result
    }

    /// Scan keys in this store's namespace matching a glob pattern
    ///
    /// Uses Redis SCAN command (non-blocking, cursor-based iteration).
    ///
    /// # Arguments
    /// * `pattern` - Glob-style pattern relative to the namespace (e.g., `"doc:*"`)
    ///
    /// # Returns
    /// Vector of matching key names, with the namespace included
    /// # Errors
    ///
    /// Returns an error if the Redis command fails.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let full_pattern = self.full_key(pattern);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            // SCAN cursor MATCH pattern COUNT 100
            let result: (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&full_pattern)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn),
                )
                .await?;

            cursor = result.0;
            keys.extend(result.1);

            // Cursor 0 means iteration is complete
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %full_pattern, count = keys.len(), "[Redis] Scanned keys matching pattern");
        Ok(keys)
    }

    /// Remove multiple fully qualified keys at once
    /// # Errors
    ///
    /// Returns an error if the Redis command fails.
    pub async fn remove_bulk(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection().await?;
        let count: usize = self.bounded(conn.del(keys)).await?;
        debug!(count = count, "[Redis] Removed keys in bulk");
        Ok(count)
    }
}

// ===== Trait Implementations =====

use crate::traits::{BackendStats, StoreAdapter};
use async_trait::async_trait;

/// Implement `StoreAdapter` trait for `RedisStore`
#[async_trait]
impl<C: CacheCodec + 'static> StoreAdapter for RedisStore<C> {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let mut conn = self.connection().await?;
        let bytes: Option<Vec<u8>> = self.bounded(conn.get(self.full_key(key))).await?;

        match bytes {
            Some(bytes) if !bytes.is_empty() => {
                let record = self.codec.deserialize::<Record>(&bytes).inspect_err(|_| {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                })?;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(record))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn store(&self, record: &Record) -> Result<String, StoreError> {
        let bytes = self.codec.serialize(record)?;
        let full_key = self.full_key(&record.key);
        let mut conn = self.connection().await?;

        match self.config.ttl {
            Some(ttl) => {
                let _: () = self.bounded(conn.pset_ex(&full_key, bytes, ttl_millis(ttl))).await?;
            }
            None => {
                let _: () = self.bounded(conn.set(&full_key, bytes)).await?;
            }
        }

        self.stores.fetch_add(1, Ordering::Relaxed);
        debug!(key = %record.key, "[Redis] Stored record");
        Ok(record.key.clone())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.exists(self.full_key(key))).await
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let keys = self.scan_keys("*").await?;
        let mut removed = 0;
        for chunk in keys.chunks(500) {
            removed += self.remove_bulk(chunk).await?;
        }
        info!(count = removed, namespace = %self.config.namespace, "[Redis] Cleared namespace");
        Ok(removed)
    }

    async fn stats(&self) -> BackendStats {
        BackendStats {
            name: self.name().to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            entries: None,
        }
    }

    async fn health_check(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        self.bounded(redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .is_ok()
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}
