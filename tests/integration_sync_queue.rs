//! Integration tests for the bounded sync queue

mod common;

use common::*;
use fallback_cache::{FallbackConfig, MemoryStore, Record, RequeuePolicy, StoreAdapter, SyncQueue};
use std::sync::Arc;

/// One record past capacity drops exactly the oldest
#[tokio::test]
async fn test_bounded_queue_drops_exactly_one() {
    for max_size in [1usize, 3, 10, 64] {
        let queue = SyncQueue::new(max_size, RequeuePolicy::Front);
        for i in 0..=max_size {
            queue.enqueue(Record::bytes(format!("k{i}"), b"v".to_vec()));
        }

        let stats = queue.stats();
        assert_eq!(stats.queue_size, max_size);
        assert_eq!(stats.dropped_total, 1, "max_size {max_size}");
        assert!(!queue.contains("k0"), "oldest item is the one evicted");
    }
}

/// With capacity 3, four writes while Primary is down leave the newest three to sync
#[tokio::test]
async fn test_overflow_while_primary_down_then_recover() {
    let h = harness(FallbackConfig::default().with_max_queue_size(3));
    h.primary.go_down();

    for key in ["post:1", "post:2", "post:3", "post:4"] {
        h.manager.cache(Record::bytes(key, key.as_bytes().to_vec())).await.unwrap();
    }
    let stats = h.manager.stats().await;
    assert_eq!(stats.sync_queue.queue_size, 3);
    assert_eq!(stats.sync_queue.dropped_total, 1);

    h.primary.come_up();
    let result = h.manager.force_sync(50).await;
    assert_eq!(result.synced, 3);

    assert!(!h.primary.inner().exists("post:1").await.unwrap());
    for key in ["post:2", "post:3", "post:4"] {
        assert!(h.primary.inner().exists(key).await.unwrap(), "{key} should reach Primary");
    }
    // The evicted write is still durable locally
    assert!(h.secondary.inner().exists("post:1").await.unwrap());
}

/// Concurrent producers never push the queue past capacity
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_respects_capacity() {
    let queue = Arc::new(SyncQueue::new(100, RequeuePolicy::Front));

    let mut handles = Vec::new();
    for task in 0..32 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                queue.enqueue(Record::bytes(format!("t{task}:{i}"), b"v".to_vec()));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = queue.stats();
    assert_eq!(stats.queue_size, 100);
    assert_eq!(stats.dropped_total, 220);
}

/// Concurrent drains never sync the same item twice
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_drains_partition_the_backlog() {
    let queue = Arc::new(SyncQueue::new(1000, RequeuePolicy::Front));
    let primary = Arc::new(MemoryStore::new());
    for i in 0..400 {
        queue.enqueue(Record::bytes(format!("d{i}"), b"v".to_vec()));
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = Arc::clone(&queue);
        let primary = Arc::clone(&primary);
        handles.push(tokio::spawn(async move {
            queue.drain_batch(primary.as_ref(), 50, 3).await.synced
        }));
    }

    let mut synced = 0;
    for handle in handles {
        synced += handle.await.unwrap();
    }

    assert_eq!(synced, 400);
    assert!(queue.is_empty());
    assert_eq!(primary.stats().await.stores, 400);
}

/// A poison item blocks the head for at most max_retries drains
#[tokio::test]
async fn test_poison_item_is_bounded_by_max_retries() {
    let h = harness(FallbackConfig::default().with_max_retries(3));
    h.primary.reject_key("poison");

    h.manager.cache(Record::bytes("poison", b"x".to_vec())).await.unwrap();
    h.manager.sync_queue().enqueue(Record::bytes("healthy", b"y".to_vec()));

    let mut drains = 0;
    while h.manager.sync_queue().contains("poison") {
        h.manager.force_sync(50).await;
        drains += 1;
        assert!(drains <= 4, "poison item should be dropped after its retries");
    }

    assert!(h.primary.inner().exists("healthy").await.unwrap());
    assert_eq!(h.manager.sync_queue().stats().failed_total, 1);
}

/// Back policy lets the rest of the backlog go first
#[tokio::test]
async fn test_back_policy_unblocks_backlog() {
    let config = FallbackConfig::default().with_requeue_policy(RequeuePolicy::Back);
    let h = harness(config);
    h.primary.reject_key("slow");

    h.manager.cache(Record::bytes("slow", b"x".to_vec())).await.unwrap();
    for key in ["b1", "b2"] {
        h.manager.sync_queue().enqueue(Record::bytes(key, b"y".to_vec()));
    }

    let result = h.manager.force_sync(2).await;
    assert_eq!(result.synced, 1);
    assert_eq!(result.requeued, 1);

    let keys: Vec<String> = h.manager.sync_queue().peek(10).into_iter().map(|p| p.key).collect();
    assert_eq!(keys, vec!["b2", "slow"]);
}
