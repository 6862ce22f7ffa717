//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Redis缓存存储集成测试，Redis不可用时跳过

#[path = "../common/mod.rs"]
mod common;

use common::{seed_user, sqlite_records, test_config, SequenceIds};
use feedsync::backend::{CacheStore, RedisCacheStore};
use feedsync::config::CacheConfig;
use feedsync::utils::{is_redis_available_url, is_redis_enabled, unique_key_prefix};
use feedsync::FeedSyncManager;
use secrecy::SecretString;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn connect() -> Option<(RedisCacheStore, String)> {
    common::setup_logging();
    let url = redis_url();
    if !is_redis_enabled() || !is_redis_available_url(&url).await {
        println!("跳过测试: Redis不可用");
        return None;
    }
    let config = CacheConfig {
        connection_string: SecretString::new(url.into()),
        key_prefix: unique_key_prefix("feedsync_test"),
        ..CacheConfig::default()
    };
    let prefix = config.key_prefix.clone();
    let store = RedisCacheStore::connect(&config)
        .await
        .expect("Redis is reachable");
    Some((store, prefix))
}

#[tokio::test]
#[serial]
async fn test_hash_operations() {
    let Some((store, prefix)) = connect().await else {
        return;
    };
    let key = format!("{}:video:1", prefix);
    let ttl = Duration::from_secs(30);

    store
        .hset_all(
            &key,
            &[
                ("title".to_string(), "hello".to_string()),
                ("author_id".to_string(), "7".to_string()),
            ],
            ttl,
        )
        .await
        .unwrap();
    assert_eq!(store.hget(&key, "title").await.unwrap().as_deref(), Some("hello"));
    assert!(store.hset_if_exists(&key, "comment_count", "3").await.unwrap());

    let missing = format!("{}:video:2", prefix);
    assert!(!store.hset_if_exists(&missing, "comment_count", "3").await.unwrap());
    assert!(!store.exists(&missing).await.unwrap());

    let batch = store
        .pipeline_hget_all(&[(missing.clone(), ttl), (key.clone(), ttl)])
        .await
        .unwrap();
    assert!(batch[0].is_empty());
    assert_eq!(batch[1].get("comment_count").map(String::as_str), Some("3"));

    store.hdel(&key, "comment_count").await.unwrap();
    assert!(store.hget(&key, "comment_count").await.unwrap().is_none());
    store.delete(&key).await.unwrap();
    assert!(store.hget_all(&key).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_sorted_set_operations() {
    let Some((store, prefix)) = connect().await else {
        return;
    };
    let key = format!("{}:feed", prefix);
    let ttl = Duration::from_secs(30);

    assert!(!store.zadd_if_exists(&key, 1.0, "1", ttl).await.unwrap());
    assert!(!store.expire(&key, ttl).await.unwrap());

    store
        .zadd(
            &key,
            &[(1.001, "1".to_string()), (1.002, "2".to_string())],
            ttl,
        )
        .await
        .unwrap();
    assert!(store.zadd_if_exists(&key, 1.003, "3", ttl).await.unwrap());
    assert_eq!(store.zcard(&key).await.unwrap(), 3);
    assert_eq!(store.zrevrange(&key).await.unwrap(), vec!["3", "2", "1"]);
    assert_eq!(
        store.zrevrange_by_score(&key, 1.002, 0.0, 1).await.unwrap(),
        vec!["2"]
    );

    assert!(store.zrem(&key, "2").await.unwrap());
    assert!(!store.zrem(&key, "2").await.unwrap());
    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_scenario_against_redis() {
    let Some((store, prefix)) = connect().await else {
        return;
    };
    let records = sqlite_records().await;
    seed_user(records.as_ref(), 1, "alice").await;
    let mut config = test_config();
    config.cache.key_prefix = prefix;
    let manager = FeedSyncManager::with_stores(
        config,
        Arc::new(store),
        records,
        Arc::new(SequenceIds::starting_at(10_000)),
    );

    let video = manager
        .coordinator()
        .publish_video(1, "redis", "play", "cover")
        .await
        .unwrap();
    let comment = manager
        .coordinator()
        .add_comment(video.video_id, 1, "stored in redis")
        .await
        .unwrap();

    let listed = manager.comments().comments(video.video_id, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment_id, comment.comment_id);
    assert!(manager.status().await.is_healthy());
}
