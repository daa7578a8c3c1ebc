//! Integration tests for cache-first loading
//!
//! Exercises the coordinator against a redb-backed store and a scriptable
//! mock remote.

use std::sync::Arc;
use std::time::Duration;

use his_core::{MockRegionSource, ROOT_PARENT, RegionRecord};
use his_storage::{RedbReferenceStore, RedbStorageConfig, ReferenceRepository};
use his_sync::{SeedOutcome, SyncCoordinator};
use tempfile::TempDir;

fn beijing_source() -> Arc<MockRegionSource> {
    let source = Arc::new(MockRegionSource::new());
    source.set_roots(vec![
        RegionRecord::new("110000", "北京市"),
        RegionRecord::new("310000", "上海市"),
    ]);
    source.set_children(
        "110000",
        vec![RegionRecord::new("110100", "市辖区").with_level("city")],
    );
    source.set_children(
        "110100",
        vec![
            RegionRecord::new("110101", "东城区"),
            RegionRecord::new("110102", "西城区"),
        ],
    );
    source
}

fn open_coordinator(temp: &TempDir, source: Arc<MockRegionSource>) -> SyncCoordinator {
    let config = RedbStorageConfig::at(temp.path().join("regions.redb"));
    let store = Arc::new(RedbReferenceStore::open(config).expect("Failed to open store"));
    SyncCoordinator::new(ReferenceRepository::new(store), source)
}

#[tokio::test]
async fn test_seed_twice_equals_seed_once() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());

    assert_eq!(
        coordinator.ensure_seed().await.unwrap(),
        SeedOutcome::Seeded(2)
    );
    assert_eq!(
        coordinator.ensure_seed().await.unwrap(),
        SeedOutcome::AlreadySeeded
    );

    assert_eq!(coordinator.repository().count().await.unwrap(), 2);
    assert_eq!(source.root_calls(), 1);
}

#[tokio::test]
async fn test_second_load_is_served_from_cache() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());

    let first = coordinator.load_children("110000").await.unwrap();
    let second = coordinator.load_children("110000").await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(source.calls_for("110000"), 1);
}

#[tokio::test]
async fn test_fetched_children_carry_requested_parent() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(MockRegionSource::new());
    source.set_children(
        "440300",
        vec![RegionRecord::new("440303", "罗湖区").with_parent("999999")],
    );
    let coordinator = open_coordinator(&temp, source);

    let children = coordinator.load_children("440300").await.unwrap();
    assert_eq!(children[0].parent_code, "440300");

    let cached = coordinator.repository().get_children("440300").await.unwrap();
    assert_eq!(cached, children);
}

#[tokio::test]
async fn test_remote_failure_yields_empty_and_leaves_store_unchanged() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());
    coordinator.ensure_seed().await.unwrap();
    let before = coordinator.repository().count().await.unwrap();

    source.fail_parent("110000");
    let children = coordinator.load_children("110000").await.unwrap();

    assert!(children.is_empty());
    assert_eq!(coordinator.repository().count().await.unwrap(), before);
    assert_eq!(coordinator.stats().remote_failures, 1);

    // Nothing was cached, so the next load goes remote again
    source.recover_parent("110000");
    assert_eq!(coordinator.load_children("110000").await.unwrap().len(), 1);
    assert_eq!(source.calls_for("110000"), 2);
}

#[tokio::test]
async fn test_failed_seed_can_be_retried() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());

    source.fail_parent(ROOT_PARENT);
    assert_eq!(coordinator.ensure_seed().await.unwrap(), SeedOutcome::Skipped);
    assert!(coordinator.load_roots().await.unwrap().is_empty());

    source.recover_parent(ROOT_PARENT);
    assert_eq!(coordinator.load_roots().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_share_one_fetch() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());
    let gate = source.hold("110100");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator.load_children("110100").await
        }));
    }

    // Let every task reach the in-flight entry before the remote answers
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.calls_for("110100") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fetch never started");
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.release();

    for handle in handles {
        let children = handle.await.unwrap().unwrap();
        assert_eq!(children.len(), 2);
    }

    assert_eq!(source.calls_for("110100"), 1);
    assert_eq!(coordinator.inflight_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_seeds_share_one_fetch() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());
    let gate = source.hold(ROOT_PARENT);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.ensure_seed().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.release();

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            SeedOutcome::Seeded(2) | SeedOutcome::AlreadySeeded
        ));
    }
    assert_eq!(source.root_calls(), 1);
}

/// A node the remote reports as childless is never cached as such, so every
/// load for it goes remote again.
#[tokio::test]
async fn test_childless_node_is_refetched_every_time() {
    let temp = TempDir::new().unwrap();
    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());

    for _ in 0..3 {
        assert!(coordinator.load_children("110101").await.unwrap().is_empty());
    }

    assert_eq!(source.calls_for("110101"), 3);
}

#[tokio::test]
async fn test_reopened_store_serves_cached_children() {
    let temp = TempDir::new().unwrap();

    {
        let coordinator = open_coordinator(&temp, beijing_source());
        coordinator.ensure_seed().await.unwrap();
        coordinator.load_children("110000").await.unwrap();
    }

    let source = beijing_source();
    let coordinator = open_coordinator(&temp, source.clone());

    assert_eq!(
        coordinator.ensure_seed().await.unwrap(),
        SeedOutcome::AlreadySeeded
    );
    assert_eq!(coordinator.load_children("110000").await.unwrap().len(), 1);
    assert_eq!(source.total_calls(), 0);
}
