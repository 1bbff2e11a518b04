//! Fallback Cache Builder
//!
//! Provides a builder for constructing a [`FallbackCacheSystem`] with default
//! or custom stores.
//!
//! # Example: Using Default Stores
//!
//! ```rust,no_run
//! use fallback_cache::FallbackCacheBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = FallbackCacheBuilder::new()
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Custom Stores
//!
//! ```rust,ignore
//! use fallback_cache::{FallbackCacheBuilder, FallbackConfig};
//! use std::sync::Arc;
//!
//! let cache = FallbackCacheBuilder::new()
//!     .with_primary(Arc::new(MyPostgresStore::new(pool)))
//!     .with_secondary(Arc::new(my_local_store))
//!     .with_config(FallbackConfig::default().with_max_queue_size(10_000))
//!     .build()
//!     .await?;
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backends::FileStore;
use crate::cache_manager::FallbackCacheManager;
use crate::config::FallbackConfig;
use crate::sync_task::SyncTask;
use crate::traits::StoreAdapter;
use crate::FallbackCacheSystem;

/// Builder for constructing a `FallbackCacheSystem`
///
/// # Default Behavior
///
/// Anything not configured explicitly falls back to:
/// - **Primary**: Redis at `REDIS_URL`, connected lazily (feature `redis`)
/// - **Secondary**: file store in `FALLBACK_CACHE_DIR` (required when no
///   Secondary is configured)
/// - **Config**: [`FallbackConfig::from_env`]
/// - **Background sync**: off
pub struct FallbackCacheBuilder {
    primary: Option<Arc<dyn StoreAdapter>>,
    secondary: Option<Arc<dyn StoreAdapter>>,
    config: Option<FallbackConfig>,
    sync_interval: Option<Duration>,
}

impl FallbackCacheBuilder {
    /// Create a new builder with nothing configured
    pub fn new() -> Self {
        Self {
            primary: None,
            secondary: None,
            config: None,
            sync_interval: None,
        }
    }

    /// Configure the Primary (network) store
    pub fn with_primary(mut self, store: Arc<dyn StoreAdapter>) -> Self {
        self.primary = Some(store);
        self
    }

    /// Configure the Secondary (local) store
    pub fn with_secondary(mut self, store: Arc<dyn StoreAdapter>) -> Self {
        self.secondary = Some(store);
        self
    }

    /// Configure queue, retry and drain settings
    pub fn with_config(mut self, config: FallbackConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Run a background drain every `interval`, in addition to request-driven drains
    pub fn with_background_sync(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Build the system with configured or default stores
    ///
    /// # Errors
    ///
    /// Returns an error if a default store cannot be created (invalid Redis
    /// URL, `FALLBACK_CACHE_DIR` unset or not writable), or if no Primary is configured
    /// and the `redis` feature is disabled.
    pub async fn build(self) -> Result<FallbackCacheSystem> {
        info!("Building Fallback Cache System");

        let primary = match self.primary {
            Some(store) => {
                info!(store = store.name(), "Using custom Primary store");
                store
            }
            None => default_primary()?,
        };

        let secondary: Arc<dyn StoreAdapter> = match self.secondary {
            Some(store) => {
                info!(store = store.name(), "Using custom Secondary store");
                store
            }
            None => {
                info!("Using default Secondary store (File)");
                Arc::new(
                    FileStore::new()
                        .await
                        .context("Failed to open default Secondary store")?,
                )
            }
        };

        let config = self.config.unwrap_or_else(FallbackConfig::from_env);
        let drain_batch_size = config.drain_batch_size;
        let cache_manager = Arc::new(FallbackCacheManager::new(primary, secondary, config));

        let sync_task = self
            .sync_interval
            .map(|interval| SyncTask::spawn(Arc::clone(&cache_manager), interval, drain_batch_size));

        info!("Fallback Cache System built successfully");

        Ok(FallbackCacheSystem {
            cache_manager,
            sync_task,
        })
    }
}

impl Default for FallbackCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "redis")]
fn default_primary() -> Result<Arc<dyn StoreAdapter>> {
    use crate::backends::{RedisStore, RedisStoreConfig};
    use crate::backends::redis_store::redis_url_from_env;

    info!("Using default Primary store (Redis)");
    Ok(Arc::new(RedisStore::lazy(&redis_url_from_env(), RedisStoreConfig::default())?))
}

#[cfg(not(feature = "redis"))]
fn default_primary() -> Result<Arc<dyn StoreAdapter>> {
    anyhow::bail!("No Primary store configured and the `redis` feature is disabled")
}
