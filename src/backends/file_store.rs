//! File Store - Embedded Local Backend
//!
//! Persists one file per record in a local directory. This is the default
//! Secondary tier: always local, and the durability boundary of the cache.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codecs::JsonCodec;
use crate::error::StoreError;
use crate::record::Record;
use crate::traits::CacheCodec;

const RECORD_EXTENSION: &str = "rec";
const TEMP_EXTENSION: &str = "tmp";

/// Environment variable naming the Secondary directory
pub const CACHE_DIR_ENV: &str = "FALLBACK_CACHE_DIR";

/// Keys whose hex encoding is longer than this are stored under a digest
///
/// Keeps every file name well below the common 255-byte limit.
const MAX_HEX_NAME_LEN: usize = 128;

/// Prefix marking digest-derived file names, never produced by hex encoding
const DIGEST_PREFIX: &str = "h-";

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for `FileStore`
///
/// There is no default directory: the Secondary is the durability
/// boundary, so it must live on storage the operator chose.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Directory holding one file per record
    pub directory: PathBuf,
    /// Upper bound for a single filesystem call
    pub op_timeout: Duration,
}

impl FileStoreConfig {
    /// Config rooted at `directory` with default timeout
    pub fn at(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Config rooted at `FALLBACK_CACHE_DIR`
    ///
    /// # Errors
    ///
    /// Returns an error if `FALLBACK_CACHE_DIR` is unset or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_dir_var(std::env::var_os(CACHE_DIR_ENV))
    }

    fn from_dir_var(value: Option<OsString>) -> Result<Self> {
        match value {
            Some(dir) if !dir.is_empty() => Ok(Self::at(dir)),
            _ => anyhow::bail!(
                "{CACHE_DIR_ENV} is not set; the Secondary store needs a directory on persistent storage"
            ),
        }
    }
}

/// File name for `key`
///
/// Short keys map to the lowercase hex of their bytes, which stays readable
/// and reversible. Longer keys map to `h-<sha256>`; the full key is still
/// kept inside the record.
fn encode_file_name(key: &str) -> String {
    let hex_name = hex::encode(key.as_bytes());
    let stem = if hex_name.len() <= MAX_HEX_NAME_LEN {
        hex_name
    } else {
        format!("{DIGEST_PREFIX}{}", hex::encode(Sha256::digest(key.as_bytes())))
    };
    format!("{stem}.{RECORD_EXTENSION}")
}

/// Local directory store with atomic file replacement
///
/// - Each record lives in `<directory>/<hex(key)>.rec`, or
///   `<directory>/h-<sha256(key)>.rec` for long keys
/// - Writes go to a uniquely named temp file, are `fsync`ed, then renamed
///   over the target, so readers never see a torn record
/// - Records survive process restarts
/// - Pluggable record encoding via [`CacheCodec`]
pub struct FileStore<C: CacheCodec = JsonCodec> {
    /// Store configuration
    config: FileStoreConfig,
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

impl FileStore<JsonCodec> {
    /// Open (creating if needed) a store in `FALLBACK_CACHE_DIR`
    /// # Errors
    ///
    /// Returns an error if `FALLBACK_CACHE_DIR` is unset or the directory
    /// cannot be created.
    pub async fn new() -> Result<Self> {
        Self::open(FileStoreConfig::from_env()?).await
    }

    /// Open (creating if needed) a store with the given config
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(config: FileStoreConfig) -> Result<Self> {
        Self::open_with_codec(config, JsonCodec).await
    }
}

impl<C: CacheCodec> FileStore<C> {
    /// Open a store with a custom codec
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open_with_codec(config: FileStoreConfig, codec: C) -> Result<Self> {
        tokio::fs::create_dir_all(&config.directory)
            .await
            .with_context(|| format!("Failed to create cache directory {:?}", config.directory))?;

        // Leftovers from writes interrupted by a crash
        let stale = remove_temp_files(&config.directory).await.unwrap_or(0);
        if stale > 0 {
            warn!(count = stale, "[File] Removed temp files from interrupted writes");
        }

        info!(directory = ?config.directory, codec = codec.name(), "File Store opened");

        Ok(Self {
            config,
            codec,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            stores: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Directory this store writes to
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.config.directory.join(encode_file_name(key))
    }

    /// Run one filesystem operation under the operation timeout
    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let timeout = self.config.op_timeout;
        let result = match tokio::time::timeout(timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(timeout)),
        };

        if let Err(e) = &result {
            self.errors.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "[File] Operation failed");
        }
        result
    }

    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let temp_path = path.with_extension(format!("{}.{TEMP_EXTENSION}", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(io_error)?;
        file.write_all(bytes).await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_error(e));
        }
        Ok(())
    }

    async fn count_records(&self) -> Result<u64, StoreError> {
        let mut count = 0;
        let mut dir = tokio::fs::read_dir(&self.config.directory).await.map_err(io_error)?;
        while let Some(entry) = dir.next_entry().await.map_err(io_error)? {
            if has_extension(&entry.path(), RECORD_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

async fn remove_temp_files(directory: &Path) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut dir = tokio::fs::read_dir(directory).await?;
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if has_extension(&path, TEMP_EXTENSION) {
            tokio::fs::remove_file(&path).await?;
            removed += 1;
        }
    }
    Ok(removed)
}

// ===== Trait Implementations =====

use crate::traits::{BackendStats, StoreAdapter};
use async_trait::async_trait;

/// Implement `StoreAdapter` trait for `FileStore`
#[async_trait]
impl<C: CacheCodec + 'static> StoreAdapter for FileStore<C> {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let path = self.path_for(key);
        let bytes = self
            .bounded(async {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(io_error(e)),
                }
            })
            .await?;

        let Some(bytes) = bytes else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let record = self.codec.deserialize::<Record>(&bytes).inspect_err(|e| {
            self.errors.fetch_add(1, Ordering::Relaxed);
            warn!(key = %key, error = %e, "[File] Stored record is unreadable");
        })?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(record))
    }

    async fn store(&self, record: &Record) -> Result<String, StoreError> {
        let bytes = self.codec.serialize(record)?;
        let path = self.path_for(&record.key);

        self.bounded(self.write_atomically(&path, &bytes)).await?;

        self.stores.fetch_add(1, Ordering::Relaxed);
        debug!(key = %record.key, bytes = bytes.len(), "[File] Stored record");
        Ok(record.key.clone())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key);
        self.bounded(async { tokio::fs::try_exists(&path).await.map_err(io_error) })
            .await
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let removed = self
            .bounded(async {
                let mut removed = 0;
                let mut dir = tokio::fs::read_dir(&self.config.directory).await.map_err(io_error)?;
                while let Some(entry) = dir.next_entry().await.map_err(io_error)? {
                    let path = entry.path();
                    if has_extension(&path, RECORD_EXTENSION) {
                        tokio::fs::remove_file(&path).await.map_err(io_error)?;
                        removed += 1;
                    }
                }
                Ok(removed)
            })
            .await?;

        info!(count = removed, directory = ?self.config.directory, "[File] Cleared records");
        Ok(removed)
    }

    async fn stats(&self) -> BackendStats {
        BackendStats {
            name: self.name().to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            entries: self.count_records().await.ok(),
        }
    }

    async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.config.directory)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }

    fn name(&self) -> &'static str {
        "File"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_are_hex_encoded() {
        assert_eq!(encode_file_name("ab"), "6162.rec");
        assert_eq!(encode_file_name("a/b"), "612f62.rec");
    }

    #[test]
    fn test_long_keys_use_fixed_width_digest() {
        let url = format!("https://example.com/articles/{}", "x".repeat(400));
        let name = encode_file_name(&url);
        assert!(name.starts_with(DIGEST_PREFIX));
        assert_eq!(name.len(), DIGEST_PREFIX.len() + 64 + 1 + RECORD_EXTENSION.len());
        assert_ne!(name, encode_file_name(&format!("{url}y")));

        // 64 bytes is the longest key that stays hex encoded
        let boundary = "k".repeat(MAX_HEX_NAME_LEN / 2);
        assert!(!encode_file_name(&boundary).starts_with(DIGEST_PREFIX));
        assert!(encode_file_name(&format!("{boundary}k")).starts_with(DIGEST_PREFIX));
    }

    #[test]
    fn test_directory_is_required() {
        assert!(FileStoreConfig::from_dir_var(None).is_err());
        assert!(FileStoreConfig::from_dir_var(Some(OsString::new())).is_err());

        let config = FileStoreConfig::from_dir_var(Some("/var/lib/app/cache".into())).unwrap();
        assert_eq!(config.directory, PathBuf::from("/var/lib/app/cache"));
        assert_eq!(config.op_timeout, DEFAULT_OP_TIMEOUT);
    }
}
