//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 时间索引缓存集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{metrics, seed_comment, seed_video, sqlite_records, test_keys, FaultyRecordStore};
use feedsync::backend::{CacheStore, MemoryCacheStore};
use feedsync::keys::{EntityKind, IndexScope};
use feedsync::model::{datetime_from_millis, Comment, Video};
use feedsync::{IndexCache, Window};
use std::sync::Arc;

const BASE: i64 = 1_700_000_000_000;

struct Fixture {
    cache: Arc<MemoryCacheStore>,
    records: Arc<FaultyRecordStore>,
    videos: IndexCache<Video>,
    comments: IndexCache<Comment>,
}

async fn fixture() -> Fixture {
    let sqlite = sqlite_records().await;
    let records = Arc::new(FaultyRecordStore::new(sqlite));
    let cache = Arc::new(MemoryCacheStore::new());
    Fixture {
        videos: IndexCache::new(cache.clone(), records.clone(), test_keys(), metrics()),
        comments: IndexCache::new(cache.clone(), records.clone(), test_keys(), metrics()),
        cache,
        records,
    }
}

fn ids<T>(items: &[T], id: impl Fn(&T) -> u64) -> Vec<u64> {
    items.iter().map(id).collect()
}

#[tokio::test]
async fn test_empty_scope_is_negatively_cached() {
    let f = fixture().await;
    let scope = IndexScope::VideoComments(42);

    assert!(f.comments.read(scope, Window::All).await.unwrap().is_empty());
    assert!(f.cache.exists(&test_keys().empty(scope)).await.unwrap());
    let reads = f.records.reads();

    // 标记存在期间不会访问数据库
    f.records.fail_reads(true);
    assert!(f.comments.read(scope, Window::All).await.unwrap().is_empty());
    assert_eq!(f.records.reads(), reads);
}

#[tokio::test]
async fn test_cold_start_populates_index_and_snapshots() {
    let f = fixture().await;
    for (id, offset) in [(11, 10), (12, 30), (13, 20)] {
        seed_comment(f.records.as_ref(), id, 5, 100, BASE + offset).await;
    }
    let scope = IndexScope::VideoComments(5);

    let comments = f.comments.read(scope, Window::All).await.unwrap();
    assert_eq!(ids(&comments, |c| c.comment_id), vec![12, 13, 11]);

    let keys = test_keys();
    assert_eq!(f.cache.zcard(&keys.index(scope)).await.unwrap(), 3);
    for id in [11, 12, 13] {
        assert!(f.cache.exists(&keys.entity(EntityKind::Comment, id)).await.unwrap());
    }

    f.records.fail_reads(true);
    let again = f.comments.read(scope, Window::All).await.unwrap();
    assert_eq!(again, comments);
}

#[tokio::test]
async fn test_feed_window_on_cold_and_warm_paths() {
    let f = fixture().await;
    for (id, offset) in [(1, 0), (2, 10), (3, 20), (4, 30)] {
        seed_video(f.records.as_ref(), id, 9, BASE + offset).await;
    }

    // latest_time 为视频3的创建时间时，视频3本身被排除
    let window = Window::feed(BASE + 20, 2);
    let cold = f.videos.read(IndexScope::GlobalFeed, window).await.unwrap();
    assert_eq!(ids(&cold, |v| v.video_id), vec![2, 1]);

    let warm = f.videos.read(IndexScope::GlobalFeed, window).await.unwrap();
    assert_eq!(warm, cold);

    let all = f.videos.read(IndexScope::GlobalFeed, Window::All).await.unwrap();
    assert_eq!(ids(&all, |v| v.video_id), vec![4, 3, 2, 1]);
}

#[tokio::test]
async fn test_append_requires_existing_index() {
    let f = fixture().await;
    let scope = IndexScope::UserPublish(9);
    let video = Video::new(50, 9, "t", "p", "c", datetime_from_millis(BASE).unwrap());

    assert!(!f.videos.append(scope, &video).await.unwrap());
    assert!(!f.cache.exists(&test_keys().index(scope)).await.unwrap());

    f.videos.populate(scope, &[video.clone()]).await.unwrap();
    let newer = Video::new(51, 9, "t2", "p", "c", datetime_from_millis(BASE + 5).unwrap());
    f.videos.entities().put(&newer).await.unwrap();
    assert!(f.videos.append(scope, &newer).await.unwrap());

    f.records.fail_reads(true);
    let listed = f.videos.read(scope, Window::All).await.unwrap();
    assert_eq!(ids(&listed, |v| v.video_id), vec![51, 50]);
}

#[tokio::test]
async fn test_append_clears_negative_marker() {
    let f = fixture().await;
    let scope = IndexScope::VideoComments(8);
    assert!(f.comments.read(scope, Window::All).await.unwrap().is_empty());

    let comment = seed_comment(f.records.as_ref(), 77, 8, 100, BASE).await;
    f.comments.append(scope, &comment).await.unwrap();
    assert!(!f.cache.exists(&test_keys().empty(scope)).await.unwrap());

    let comments = f.comments.read(scope, Window::All).await.unwrap();
    assert_eq!(ids(&comments, |c| c.comment_id), vec![77]);
}

#[tokio::test]
async fn test_remove_and_invalidate() {
    let f = fixture().await;
    for (id, offset) in [(21, 1), (22, 2)] {
        seed_comment(f.records.as_ref(), id, 6, 100, BASE + offset).await;
    }
    let scope = IndexScope::VideoComments(6);
    f.comments.read(scope, Window::All).await.unwrap();

    assert!(f.comments.remove(scope, 22).await.unwrap());
    assert!(!f.comments.remove(scope, 22).await.unwrap());
    let remaining = f.comments.read(scope, Window::All).await.unwrap();
    assert_eq!(ids(&remaining, |c| c.comment_id), vec![21]);

    f.comments.invalidate(scope).await.unwrap();
    let rebuilt = f.comments.read(scope, Window::All).await.unwrap();
    assert_eq!(ids(&rebuilt, |c| c.comment_id), vec![22, 21]);
}

#[tokio::test]
async fn test_scope_kind_mismatch_is_rejected() {
    let f = fixture().await;
    let err = f
        .videos
        .read(IndexScope::VideoComments(1), Window::All)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), feedsync::ErrorKind::Validation);
}
