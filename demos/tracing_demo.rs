//! Tracing Demo
//!
//! Points Primary at a port nothing listens on, so the log shows the
//! degrade path: Primary marked unavailable, writes queued, reads served
//! from the local file store.
//!
//! Run with: RUST_LOG=fallback_cache=debug cargo run --example tracing_demo

use fallback_cache::{
    FallbackCacheBuilder, FallbackConfig, FileStore, FileStoreConfig, Record, RedisStore,
    RedisStoreConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .init();

    tracing::info!("Starting fallback tracing demo");

    let primary = RedisStore::lazy(
        "redis://127.0.0.1:1",
        RedisStoreConfig {
            op_timeout: Duration::from_millis(500),
            ..RedisStoreConfig::default()
        },
    )?;
    let secondary =
        FileStore::open(FileStoreConfig::at(std::env::temp_dir().join("fallback-cache-demo"))).await?;

    let cache = FallbackCacheBuilder::new()
        .with_primary(Arc::new(primary))
        .with_secondary(Arc::new(secondary))
        .with_config(FallbackConfig::default().with_retry_interval(Duration::from_secs(1)))
        .with_background_sync(Duration::from_secs(2))
        .build()
        .await?;

    let manager = cache.cache_manager();
    for i in 0..3 {
        manager.cache(Record::bytes(format!("demo:{i}"), format!("payload {i}"))).await?;
    }
    manager.get_cached("demo:0").await?;

    // Let the background task attempt (and fail) a drain
    tokio::time::sleep(Duration::from_secs(3)).await;

    let stats = manager.stats().await;
    tracing::info!(
        availability = ?stats.availability,
        pending = stats.sync_queue.queue_size,
        "Operation complete"
    );

    cache.shutdown().await;
    Ok(())
}
