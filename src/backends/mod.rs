//! Store Adapter Implementations
//!
//! This module contains the concrete [`StoreAdapter`](crate::traits::StoreAdapter)
//! implementations the fallback cache ships with.
//!
//! # Available Backends
//!
//! ## Primary (network)
//! - **Redis** - Shared durable store with automatic reconnection (feature: `redis`, default)
//!
//! ## Secondary (local)
//! - **File** - One file per record on local disk, atomic replacement (default Secondary)
//! - **Memory** - Concurrent `DashMap` store, not durable (tests, ephemeral setups)
//!
//! # Usage
//!
//! ```rust,no_run
//! use fallback_cache::backends::{FileStore, FileStoreConfig, RedisStore, RedisStoreConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let primary = RedisStore::lazy("redis://localhost:6379", RedisStoreConfig::default())?;
//! let secondary = FileStore::open(FileStoreConfig::at("/var/lib/my-app/cache")).await?;
//! # Ok(())
//! # }
//! ```

pub mod file_store;
pub mod memory_store;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use file_store::{FileStore, FileStoreConfig};
pub use memory_store::MemoryStore;

#[cfg(feature = "redis")]
pub use redis_store::{RedisStore, RedisStoreConfig};
