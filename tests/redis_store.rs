//! Tests against a live Redis server.
//!
//! Skipped unless `REDIS_URL` is set, e.g. `REDIS_URL=redis://127.0.0.1:6379/15`.
//! Each test works in its own key namespace and clears it afterwards.

#![cfg(feature = "redis")]

use proxyman::{
    ManagerConfig, PoolManager, ProxyStore, RedisStore, StaticSource, StoreConfig, Strategy,
};
use std::sync::Arc;
use tokio_test::assert_ok;

fn store_config(test: &str) -> Option<StoreConfig> {
    let raw = std::env::var("REDIS_URL").ok()?;
    let url = url::Url::parse(&raw).ok()?;
    Some(StoreConfig {
        host: url.host_str()?.to_string(),
        port: url.port().unwrap_or(6379),
        db: url.path().trim_start_matches('/').parse().unwrap_or(0),
        namespace: format!("proxyman-test-{}-{}", test, std::process::id()),
        ..StoreConfig::default()
    })
}

async fn fresh_store(config: &StoreConfig) -> RedisStore {
    let store = RedisStore::connect(config).await.unwrap();
    store.clear().await.unwrap();
    store
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_evict_exactly_once() {
    let Some(config) = store_config("evict") else {
        return;
    };
    let store = Arc::new(fresh_store(&config).await);
    let key = "u:p@1.1.1.1:80";
    store.insert(key).await.unwrap();
    store.insert("u:p@2.2.2.2:80").await.unwrap();

    let threshold = 6;
    let handles: Vec<_> = (0..threshold)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.record_failure(key, threshold).await })
        })
        .collect();

    let mut evictions = 0;
    let mut counts = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap().unwrap();
        counts.push(outcome.failure_count);
        if outcome.evicted {
            evictions += 1;
        }
    }
    counts.sort_unstable();

    assert_eq!(evictions, 1);
    assert_eq!(counts, (1..=u64::from(threshold)).collect::<Vec<_>>());
    assert!(store.get(key).await.unwrap().is_none());

    let remaining: Vec<String> = store.get_all().await.unwrap().into_iter().map(|r| r.key).collect();
    assert_eq!(remaining, vec!["u:p@2.2.2.2:80"]);

    store.clear().await.unwrap();
}

#[tokio::test]
async fn cursor_survives_reconnect() {
    let Some(config) = store_config("cursor") else {
        return;
    };
    {
        let store = fresh_store(&config).await;
        assert_eq!(store.advance_cursor().await.unwrap(), 0);
        assert_eq!(store.advance_cursor().await.unwrap(), 1);
        assert_eq!(store.advance_cursor().await.unwrap(), 2);
    }

    let store = RedisStore::connect(&config).await.unwrap();
    assert_eq!(store.cursor().await.unwrap(), 3);
    assert_eq!(store.advance_cursor().await.unwrap(), 3);

    store.clear().await.unwrap();
    assert_eq!(store.cursor().await.unwrap(), 0);
}

#[tokio::test]
async fn counters_follow_reported_outcomes() {
    let Some(config) = store_config("counters") else {
        return;
    };
    let store = fresh_store(&config).await;
    let key = "u:p@1.1.1.1:80";

    assert!(assert_ok!(store.insert(key).await));
    assert!(!assert_ok!(store.insert(key).await));

    store.record_failure(key, 3).await.unwrap();
    store.record_failure(key, 3).await.unwrap();
    assert!(store.record_success(key).await.unwrap());

    let record = store.get(key).await.unwrap().unwrap();
    assert_eq!(record.success_count, 1);
    assert_eq!(record.failure_count, 0);
    assert_eq!(record.total_requests, 3);

    assert!(!store.record_success("missing@0.0.0.0:1").await.unwrap());
    assert_eq!(store.record_failure("missing@0.0.0.0:1", 3).await.unwrap(), None);

    assert!(store.remove(key).await.unwrap());
    assert!(!store.remove(key).await.unwrap());
    assert_eq!(store.len().await.unwrap(), 0);

    store.clear().await.unwrap();
}

#[tokio::test]
async fn sequential_rotation_resumes_after_restart() {
    let Some(config) = store_config("rotation") else {
        return;
    };
    let source = Arc::new(StaticSource::new(vec![
        "1.1.1.1:80:u:p",
        "2.2.2.2:80:u:p",
        "3.3.3.3:80:u:p",
    ]));
    let manager_config = ManagerConfig::builder()
        .strategy(Strategy::Sequential)
        .store(config.clone())
        .build();

    {
        let store = Arc::new(fresh_store(&config).await);
        let pool = PoolManager::new(manager_config.clone(), store, source.clone());
        assert_eq!(pool.initialize().await.unwrap(), 3);
        assert_eq!(pool.select_proxy().await.unwrap().key(), "u:p@1.1.1.1:80");
        assert_eq!(pool.select_proxy().await.unwrap().key(), "u:p@2.2.2.2:80");
    }

    let store = Arc::new(RedisStore::connect(&config).await.unwrap());
    let pool = PoolManager::new(manager_config, store.clone(), source);
    assert_eq!(pool.initialize().await.unwrap(), 0);
    assert_eq!(pool.select_proxy().await.unwrap().key(), "u:p@3.3.3.3:80");
    assert_eq!(pool.select_proxy().await.unwrap().key(), "u:p@1.1.1.1:80");

    store.clear().await.unwrap();
}
