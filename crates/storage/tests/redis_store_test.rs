//! Live-Redis tests. Run with `cargo test -- --ignored` against a disposable
//! instance (TEST_REDIS_URL).

use std::time::Duration;

use agent_coord_storage::{KvStore, RedisStore};
use uuid::Uuid;

fn get_test_redis_url() -> String {
    std::env::var("TEST_REDIS_URL").expect("TEST_REDIS_URL must be set")
}

fn test_store() -> RedisStore {
    RedisStore::new(&get_test_redis_url(), Duration::from_secs(5))
        .expect("Failed to create test Redis store")
}

// Unique key prefix per test run so parallel runs never collide
fn test_key_prefix() -> String {
    format!("test:{}:", Uuid::new_v4())
}

async fn cleanup_keys(store: &RedisStore, prefix: &str) {
    let pattern = format!("{}*", prefix);
    if let Ok(keys) = store.keys(&pattern).await {
        for key in keys {
            let _ = store.delete(&key).await;
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_connection() {
    let store = test_store();
    store.ping().await.expect("Ping failed");
}

#[tokio::test]
#[ignore]
async fn test_set_ex_and_get() {
    let store = test_store();
    let prefix = test_key_prefix();
    let key = format!("{}value", prefix);

    store.set_ex(&key, "v", 60).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), Some("v".to_string()));

    cleanup_keys(&store, &prefix).await;
}

#[tokio::test]
#[ignore]
async fn test_set_nx_is_atomic_acquire() {
    let store = test_store();
    let prefix = test_key_prefix();
    let key = format!("{}nx", prefix);

    assert!(store.set_nx_ex(&key, "first", 60).await.unwrap());
    assert!(!store.set_nx_ex(&key, "second", 60).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap(), Some("first".to_string()));

    cleanup_keys(&store, &prefix).await;
}

#[tokio::test]
#[ignore]
async fn test_ttl_expiry() {
    let store = test_store();
    let prefix = test_key_prefix();
    let key = format!("{}expiring", prefix);

    store.set_ex(&key, "v", 1).await.unwrap();
    assert!(store.get(&key).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(store.get(&key).await.unwrap().is_none());

    cleanup_keys(&store, &prefix).await;
}

#[tokio::test]
#[ignore]
async fn test_mget_preserves_order() {
    let store = test_store();
    let prefix = test_key_prefix();
    let k1 = format!("{}a", prefix);
    let k2 = format!("{}missing", prefix);
    let k3 = format!("{}b", prefix);

    store.set_ex(&k1, "1", 60).await.unwrap();
    store.set_ex(&k3, "3", 60).await.unwrap();

    let values = store.mget(&[k1, k2, k3]).await.unwrap();
    assert_eq!(
        values,
        vec![Some("1".to_string()), None, Some("3".to_string())]
    );

    cleanup_keys(&store, &prefix).await;
}

#[tokio::test]
#[ignore]
async fn test_sorted_set_range() {
    let store = test_store();
    let prefix = test_key_prefix();
    let key = format!("{}idx", prefix);

    store.zadd(&key, "old", 100.0).await.unwrap();
    store.zadd(&key, "new", 200.0).await.unwrap();

    let recent = store.zrange_by_score(&key, 150.0, f64::INFINITY).await.unwrap();
    assert_eq!(recent, vec!["new".to_string()]);

    let all = store
        .zrange_by_score(&key, f64::NEG_INFINITY, f64::INFINITY)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    cleanup_keys(&store, &prefix).await;
}
