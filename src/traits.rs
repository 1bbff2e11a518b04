//! Store Adapter Traits
//!
//! This module defines the trait abstractions that let the fallback cache
//! work against any pair of backends, plus the pluggable serialization codec
//! used by byte-oriented stores.
//!
//! # Architecture
//!
//! - `CacheCodec`: Trait for pluggable record serialization
//! - `StoreAdapter`: Contract shared by the Primary and Secondary stores
//!
//! # Example: Custom Store
//!
//! ```rust,ignore
//! use fallback_cache::{async_trait, BackendStats, Record, StoreAdapter, StoreError};
//!
//! struct MyStore {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl StoreAdapter for MyStore {
//!     async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
//!         // Your implementation
//!     }
//!
//!     async fn store(&self, record: &Record) -> Result<String, StoreError> {
//!         // Your implementation
//!     }
//!
//!     async fn exists(&self, key: &str) -> Result<bool, StoreError> {
//!         // Your implementation
//!     }
//!
//!     async fn clear(&self) -> Result<usize, StoreError> {
//!         // Your implementation
//!     }
//!
//!     async fn stats(&self) -> BackendStats {
//!         // Your implementation
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::StoreError;
use crate::record::Record;

/// Trait for record serialization/deserialization
///
/// Stores that persist bytes (Redis, local files) encode records through a
/// codec so the wire format can be swapped without touching the store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + Debug` to be shared across tasks.
///
/// # Example: Custom Codec
///
/// ```rust,ignore
/// use fallback_cache::{CacheCodec, StoreError};
/// use serde::{Serialize, de::DeserializeOwned};
///
/// #[derive(Debug)]
/// struct MyCustomCodec;
///
/// impl CacheCodec for MyCustomCodec {
///     fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
///         mycodec::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
///     }
///
///     fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
///         mycodec::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "mycodec"
///     }
/// }
/// ```
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the value cannot be encoded.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, StoreError>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the bytes are not a valid encoding.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError>;

    /// Get the name of the codec, for logging
    fn name(&self) -> &'static str;
}

/// Point-in-time counters reported by a store adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStats {
    /// Backend name (e.g., "Redis", "File", "Memory")
    pub name: String,
    /// Reads that found a record
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Successful upserts
    pub stores: u64,
    /// Operations that returned an error
    pub errors: u64,
    /// Number of stored records, when the backend can count cheaply
    pub entries: Option<u64>,
}

/// Contract implemented by both the Primary and Secondary stores
///
/// The manager is agnostic to which backend sits behind either tier.
///
/// # Failure Semantics
///
/// - "Not found" is `Ok(None)` / `Ok(false)`, never an error
/// - Transport failures surface as a typed [`StoreError`]
/// - Adapters never retry internally; retry policy belongs to the manager
/// - Each call is bounded by an adapter-owned timeout, reported as
///   [`StoreError::Timeout`]
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the manager calls them
/// concurrently from many request handlers.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Get the current record for `key`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - Record found
    /// * `Ok(None)` - Key not present
    /// * `Err(e)` - Transport or decode failure
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError>;

    /// Upsert `record` under its key
    ///
    /// # Returns
    ///
    /// * `Ok(key)` - Record stored
    /// * `Err(e)` - Transport or encode failure
    async fn store(&self, record: &Record) -> Result<String, StoreError>;

    /// Check whether `key` is present without materializing the payload
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every record owned by this store
    ///
    /// Destructive, for administrative use only.
    ///
    /// # Returns
    ///
    /// Number of records removed.
    async fn clear(&self) -> Result<usize, StoreError>;

    /// Snapshot of this store's counters
    async fn stats(&self) -> BackendStats;

    /// Check if the backend is operational
    ///
    /// The default implementation checks with an `exists` call.
    async fn health_check(&self) -> bool {
        self.exists("__fallback_cache_health_check__").await.is_ok()
    }

    /// Get the name of this store, for logging
    fn name(&self) -> &'static str {
        "unknown"
    }
}
