//! Integration tests for the background sync task and the system builder

mod common;

use common::*;
use fallback_cache::{
    FallbackCacheBuilder, FallbackConfig, FileStore, FileStoreConfig, Record, StoreAdapter,
    SyncTask,
};
use std::sync::Arc;
use std::time::Duration;

/// Wait until `check` passes or the deadline expires
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test]
async fn test_background_task_drains_after_recovery() {
    let h = harness(FallbackConfig::default());
    h.primary.go_down();
    for key in ["page:1", "page:2", "page:3"] {
        h.manager.cache(Record::bytes(key, b"x".to_vec())).await.unwrap();
    }

    let task = SyncTask::spawn(Arc::clone(&h.manager), Duration::from_millis(25), 50);
    h.primary.come_up();

    let manager = Arc::clone(&h.manager);
    assert!(eventually(|| manager.sync_queue().is_empty()).await, "backlog should drain");
    assert!(eventually(|| task.stats().synced == 3).await);
    assert!(h.primary.inner().exists("page:3").await.unwrap());
    assert!(task.stats().runs >= 1);
    task.shutdown().await;
}

/// A zero interval still ticks instead of panicking the runtime
#[tokio::test]
async fn test_zero_interval_is_clamped() {
    let h = harness(FallbackConfig::default());
    h.primary.go_down();
    h.manager.cache(Record::bytes("page:1", b"x".to_vec())).await.unwrap();

    let task = SyncTask::spawn(Arc::clone(&h.manager), Duration::ZERO, 50);
    h.primary.come_up();

    let manager = Arc::clone(&h.manager);
    assert!(eventually(|| manager.sync_queue().is_empty()).await, "backlog should drain");
    assert!(h.primary.inner().exists("page:1").await.unwrap());
    task.shutdown().await;
}

#[tokio::test]
async fn test_background_task_idles_on_empty_queue() {
    let h = harness(FallbackConfig::default());
    let task = SyncTask::spawn(Arc::clone(&h.manager), Duration::from_millis(10), 50);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(task.stats().runs, 0);
    assert_eq!(h.primary.store_calls(), 0);
    task.shutdown().await;
}

#[tokio::test]
async fn test_builder_wires_custom_stores_and_background_sync() {
    let dir = temp_cache_dir("builder");
    let primary = Arc::new(FlakyStore::down());
    let secondary = Arc::new(FileStore::open(FileStoreConfig::at(&dir)).await.unwrap());

    let system = FallbackCacheBuilder::new()
        .with_primary(Arc::clone(&primary) as Arc<dyn StoreAdapter>)
        .with_secondary(secondary)
        .with_config(FallbackConfig::default().with_max_queue_size(10))
        .with_background_sync(Duration::from_millis(25))
        .build()
        .await
        .unwrap();

    assert!(system.health_check().await, "Secondary is healthy");
    let manager = Arc::clone(system.cache_manager());
    manager.cache(Record::bytes("doc", b"x".to_vec())).await.unwrap();
    assert_eq!(manager.sync_queue().stats().max_size, 10);

    primary.come_up();
    assert!(eventually(|| manager.sync_queue().is_empty()).await);
    assert!(primary.inner().exists("doc").await.unwrap());

    system.shutdown().await;
    let _ = tokio::fs::remove_dir_all(&dir).await;
}
