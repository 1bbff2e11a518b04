//! Fallback Cache
//!
//! A resilient two-tier caching layer for content-processing pipelines:
//! - **Primary**: Durable network store (Redis by default), system of record when reachable
//! - **Secondary**: Always-local store (files on disk by default), written first on every `cache`
//! - **Availability Tracking**: Tri-state Primary health with rate-limited retries
//! - **Sync Queue**: Bounded backlog of writes that missed Primary, replayed on recovery
//! - **No Caller-Visible Outages**: Only a failure of both tiers is reported
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fallback_cache::{FallbackCacheSystem, Record};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = FallbackCacheSystem::new().await?;
//!     let manager = cache.cache_manager();
//!
//!     // Secondary first, then Primary; queued for later if Primary is down
//!     let record = Record::document("doc:42", serde_json::json!({"title": "Quarterly report"}));
//!     manager.cache(record).await?;
//!
//!     // Primary first, Secondary fallback
//!     if let Some(cached) = manager.get_cached("doc:42").await? {
//!         tracing::info!(key = %cached.key, "Cached record found");
//!     }
//!
//!     let stats = manager.stats().await;
//!     tracing::info!(pending = stats.sync_queue.queue_size, "Pending Primary writes");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! write → Secondary (always) → Primary ──✗──► SyncQueue ──drain──► Primary
//! read  → Primary (if believed up) ──miss/✗──► Secondary
//! ```

use std::sync::Arc;
use anyhow::Result;
use tracing::{info, warn};

pub mod availability;
pub mod backends;
pub mod builder;
pub mod cache_manager;
pub mod codecs;
pub mod config;
pub mod error;
pub mod record;
pub mod sync_queue;
pub mod sync_task;
pub mod traits;

pub use availability::Availability;
pub use backends::{FileStore, FileStoreConfig, MemoryStore};
#[cfg(feature = "redis")]
pub use backends::{RedisStore, RedisStoreConfig};
pub use builder::FallbackCacheBuilder;
pub use cache_manager::{
    ClearReport, FallbackCacheManager, ManagerStats, RequestStats, TierClear,
    DEFAULT_FORCE_SYNC_BATCH,
};
pub use codecs::JsonCodec;
#[cfg(feature = "msgpack")]
pub use codecs::MsgPackCodec;
pub use config::{FallbackConfig, RequeuePolicy};
pub use error::{CacheError, StoreError};
pub use record::{Payload, Record};
pub use sync_queue::{DrainResult, PendingItem, SyncQueue, SyncQueueStats};
pub use sync_task::{SyncTask, SyncTaskStats};
pub use traits::{BackendStats, CacheCodec, StoreAdapter};

// Re-export async_trait for user convenience
pub use async_trait::async_trait;

/// Main entry point for the Fallback Cache system
///
/// Owns the shared [`FallbackCacheManager`] and, when enabled, the
/// background sync task.
///
/// # Example
///
/// ```rust,no_run
/// use fallback_cache::FallbackCacheSystem;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let cache = FallbackCacheSystem::new().await?;
///
///     // Use cache_manager for all operations
///     let manager = cache.cache_manager();
///
///     Ok(())
/// }
/// ```
pub struct FallbackCacheSystem {
    /// Unified cache manager (primary interface)
    pub cache_manager: Arc<FallbackCacheManager>,
    /// Periodic drain, when configured
    pub sync_task: Option<SyncTask>,
}

impl FallbackCacheSystem {
    /// Create cache system with default stores and environment config
    ///
    /// # Configuration
    ///
    /// - `REDIS_URL` - Primary Redis (default `redis://127.0.0.1:6379`)
    /// - `FALLBACK_CACHE_DIR` - Secondary directory, **required**. It must be on
    ///   persistent storage (not a tmpfs or a directory wiped at boot): records
    ///   queued for Primary survive a restart only through this directory.
    /// - `FALLBACK_CACHE_*` - see [`FallbackConfig::from_env`]
    ///
    /// Redis is connected lazily, so this succeeds while Redis is down.
    ///
    /// # Errors
    ///
    /// Returns an error if `FALLBACK_CACHE_DIR` is unset or a default store
    /// cannot be created.
    pub async fn new() -> Result<Self> {
        info!("Initializing Fallback Cache System");
        FallbackCacheBuilder::new().build().await
    }

    /// Create cache system with a custom Redis URL as Primary
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection string (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the Secondary cannot be created.
    #[cfg(feature = "redis")]
    pub async fn with_redis_url(redis_url: &str) -> Result<Self> {
        info!(redis_url = %redis_url, "Initializing Fallback Cache System with custom Redis URL");

        let primary = Arc::new(RedisStore::lazy(redis_url, RedisStoreConfig::default())?);
        FallbackCacheBuilder::new().with_primary(primary).build().await
    }

    /// Perform health check on both tiers
    ///
    /// Returns `true` if Secondary is operational. Primary failure is
    /// tolerated (graceful degradation).
    pub async fn health_check(&self) -> bool {
        let primary_ok = self.cache_manager.primary().health_check().await;
        let secondary_ok = self.cache_manager.secondary().health_check().await;

        if primary_ok && secondary_ok {
            info!("Fallback Cache health check passed");
        } else {
            warn!(primary_ok = %primary_ok, secondary_ok = %secondary_ok, "Fallback Cache health check - partial failure");
        }
        secondary_ok
    }

    /// Get reference to cache manager (primary interface)
    pub fn cache_manager(&self) -> &Arc<FallbackCacheManager> {
        &self.cache_manager
    }

    /// Stop the background sync task, if running
    pub async fn shutdown(mut self) {
        if let Some(task) = self.sync_task.take() {
            task.shutdown().await;
        }
    }
}
