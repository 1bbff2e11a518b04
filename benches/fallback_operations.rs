//! Benchmarks for fallback cache manager operations
//!
//! This benchmark suite measures the performance of:
//! - `cache` with a healthy Primary
//! - `cache` with Primary believed down (Secondary + enqueue)
//! - `get_cached` served by Primary vs. by Secondary
//!
//! Both tiers are in-memory stores, so the numbers reflect coordination
//! overhead rather than I/O.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fallback_cache::{
    BackendStats, FallbackCacheManager, FallbackConfig, MemoryStore, Record, StoreAdapter,
    StoreError, async_trait,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Primary that refuses every connection
struct DownStore;

#[async_trait]
impl StoreAdapter for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<Record>, StoreError> {
        Err(StoreError::Connection("refused".into()))
    }

    async fn store(&self, _record: &Record) -> Result<String, StoreError> {
        Err(StoreError::Connection("refused".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Connection("refused".into()))
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        Err(StoreError::Connection("refused".into()))
    }

    async fn stats(&self) -> BackendStats {
        BackendStats::default()
    }
}

fn manager(primary: Arc<dyn StoreAdapter>) -> FallbackCacheManager {
    let config = FallbackConfig::default().with_max_queue_size(10_000);
    FallbackCacheManager::new(primary, Arc::new(MemoryStore::new()), config)
}

/// Generate a document of roughly `size_bytes`
fn test_record(key: String, size_bytes: usize) -> Record {
    Record::document(key, json!({ "body": "x".repeat(size_bytes), "size": size_bytes }))
}

/// Benchmark writes with Primary up and Primary down
fn bench_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("Failed to create runtime"));
    let healthy = manager(Arc::new(MemoryStore::new()));
    let degraded = manager(Arc::new(DownStore));

    let mut group = c.benchmark_group("fallback_cache_write");
    group.measurement_time(Duration::from_secs(5));

    for size in &[100usize, 1024, 10_240] {
        group.bench_with_input(BenchmarkId::new("primary_up", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:set:{}", rand::random::<u32>());
                    black_box(healthy.cache(test_record(key, size)).await)
                        .unwrap_or_else(|_| panic!("Failed to cache"));
                });
            });
        });

        group.bench_with_input(BenchmarkId::new("primary_down", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let key = format!("bench:set:{}", rand::random::<u32>());
                    black_box(degraded.cache(test_record(key, size)).await)
                        .unwrap_or_else(|_| panic!("Failed to cache"));
                });
            });
        });
    }

    group.finish();
}

/// Benchmark reads served by each tier
fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap_or_else(|_| panic!("Failed to create runtime"));
    let healthy = manager(Arc::new(MemoryStore::new()));
    let degraded = manager(Arc::new(DownStore));

    rt.block_on(async {
        for m in [&healthy, &degraded] {
            m.cache(test_record("bench:hot".to_string(), 1024))
                .await
                .unwrap_or_else(|_| panic!("Failed to seed cache"));
        }
    });

    let mut group = c.benchmark_group("fallback_cache_read");
    group.bench_function("primary_hit", |b| {
        b.iter(|| rt.block_on(async { black_box(healthy.get_cached("bench:hot").await.ok()) }));
    });
    group.bench_function("secondary_fallback", |b| {
        b.iter(|| rt.block_on(async { black_box(degraded.get_cached("bench:hot").await.ok()) }));
    });
    group.bench_function("miss", |b| {
        b.iter(|| rt.block_on(async { black_box(healthy.get_cached("bench:cold").await.ok()) }));
    });
    group.finish();
}

criterion_group!(benches, bench_cache, bench_get);
criterion_main!(benches);
