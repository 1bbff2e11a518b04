//! Basic Usage Example
//!
//! Demonstrates simple cache operations: cache, get, exists, stats and a
//! manual sync. Works with or without a reachable Redis.
//!
//! Run with: FALLBACK_CACHE_DIR=$HOME/.cache/fallback-cache cargo run --example basic_usage

use fallback_cache::{DEFAULT_FORCE_SYNC_BATCH, FallbackCacheSystem, Record};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== Fallback Cache: Basic Usage ===\n");

    // 1. Initialize cache system (Default: Redis Primary + File Secondary)
    let cache = FallbackCacheSystem::new().await?;
    let manager = cache.cache_manager();

    // 2. Health check (Secondary must be up, Primary may be down)
    if cache.health_check().await {
        println!("✅ Secondary store is healthy\n");
    }

    // 3. Cache a processed document
    let report = serde_json::json!({
        "id": 42,
        "title": "Quarterly report",
        "sections": ["summary", "revenue", "outlook"]
    });
    println!("Caching document report:42...");
    manager.cache(Record::document("report:42", report)).await?;

    // 4. Cache raw bytes
    manager.cache(Record::bytes("thumbnail:42", vec![0x89, 0x50, 0x4e, 0x47])).await?;
    println!();

    // 5. Retrieve
    if let Some(record) = manager.get_cached("report:42").await? {
        println!("✅ Retrieved {} (updated_at={})", record.key, record.updated_at);
    }
    println!("thumbnail:42 cached: {}\n", manager.cache_exists("thumbnail:42").await);

    // 6. Statistics
    let stats = manager.stats().await;
    println!("=== Cache Statistics ===");
    println!("Primary availability: {:?}", stats.availability);
    println!("Primary hits: {}", stats.requests.primary_hits);
    println!("Secondary hits: {}", stats.requests.secondary_hits);
    println!("Pending Primary writes: {}", stats.sync_queue.queue_size);
    for pending in &stats.pending {
        println!("  - {} (retries: {})", pending.key, pending.retry_count);
    }
    println!();

    // 7. Push any backlog to Primary now
    let result = manager.force_sync(DEFAULT_FORCE_SYNC_BATCH).await;
    println!(
        "Manual sync: synced={} failed={} requeued={}",
        result.synced, result.failed, result.requeued
    );

    cache.shutdown().await;
    Ok(())
}
