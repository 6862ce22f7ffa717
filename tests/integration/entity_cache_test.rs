//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 实体快照缓存集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{metrics, seed_video, sqlite_records, test_keys, FaultyRecordStore};
use feedsync::backend::{CacheStore, MemoryCacheStore};
use feedsync::keys::EntityKind;
use feedsync::model::Video;
use feedsync::EntityCache;
use std::sync::Arc;
use std::time::Duration;

async fn setup() -> (EntityCache<Video>, Arc<MemoryCacheStore>, Arc<FaultyRecordStore>) {
    let sqlite = sqlite_records().await;
    for (id, created) in [(1, 1_000), (2, 2_000), (3, 3_000)] {
        seed_video(sqlite.as_ref(), id, 7, 1_700_000_000_000 + created).await;
    }
    let records = Arc::new(FaultyRecordStore::new(sqlite));
    let cache = Arc::new(MemoryCacheStore::new());
    let entities = EntityCache::new(cache.clone(), records.clone(), test_keys(), metrics());
    (entities, cache, records)
}

fn ids(videos: &[Video]) -> Vec<u64> {
    videos.iter().map(|v| v.video_id).collect()
}

#[tokio::test]
async fn test_batch_read_preserves_request_order() {
    let (entities, _cache, records) = setup().await;

    let first = entities.get_batch(&[3, 1, 2]).await.unwrap();
    assert_eq!(ids(&first), vec![3, 1, 2]);
    assert_eq!(records.reads(), 1, "misses must be resolved by one batch query");

    // 第二次读取全部命中，不再访问数据库
    records.fail_reads(true);
    let second = entities.get_batch(&[2, 3, 1]).await.unwrap();
    assert_eq!(ids(&second), vec![2, 3, 1]);
    assert_eq!(second[1], first[0]);
}

#[tokio::test]
async fn test_unknown_ids_are_dropped() {
    let (entities, _cache, _records) = setup().await;
    let videos = entities.get_batch(&[2, 99, 1]).await.unwrap();
    assert_eq!(ids(&videos), vec![2, 1]);
    assert!(entities.get(99).await.unwrap().is_none());
}

#[tokio::test]
async fn test_backfill_is_idempotent() {
    let (entities, cache, records) = setup().await;
    let video = entities.get_batch(&[1]).await.unwrap().remove(0);

    entities.put(&video).await.unwrap();
    entities.put_many(&[video.clone(), video.clone()]).await.unwrap();

    let key = test_keys().entity(EntityKind::Video, 1);
    let fields = cache.hget_all(&key).await.unwrap();
    assert_eq!(fields.get("title").map(String::as_str), Some("video 1"));
    assert_eq!(
        fields.get("created_at").map(String::as_str),
        Some("1700000001000")
    );

    records.fail_reads(true);
    assert_eq!(entities.get(1).await.unwrap(), Some(video));
}

#[tokio::test]
async fn test_unreadable_snapshot_is_reloaded() {
    let (entities, cache, records) = setup().await;
    let key = test_keys().entity(EntityKind::Video, 2);
    cache
        .hset_all(
            &key,
            &[("title".to_string(), "orphan".to_string())],
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let videos = entities.get_batch(&[2]).await.unwrap();
    assert_eq!(videos[0].title, "video 2");
    assert_eq!(records.reads(), 1);

    // 重新写入的快照可被直接读取
    let fields = cache.hget_all(&key).await.unwrap();
    assert_eq!(fields.get("author_id").map(String::as_str), Some("7"));
}

#[tokio::test]
async fn test_invalidate_forces_reload() {
    let (entities, _cache, records) = setup().await;
    entities.get_batch(&[1, 2]).await.unwrap();
    entities.invalidate(2).await.unwrap();

    let before = records.reads();
    let videos = entities.get_batch(&[1, 2]).await.unwrap();
    assert_eq!(ids(&videos), vec![1, 2]);
    assert_eq!(records.reads(), before + 1);
}

#[tokio::test]
async fn test_store_failure_is_propagated() {
    let (entities, _cache, records) = setup().await;
    records.fail_reads(true);
    let err = entities.get_batch(&[1]).await.unwrap_err();
    assert!(err.is_store_unavailable());
}
