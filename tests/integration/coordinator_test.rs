//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 写操作协调器集成测试：事务与缓存写入的一致性

#[path = "../common/mod.rs"]
mod common;

use common::{manager_with, seed_comment, seed_user, seed_video, sqlite_records, test_keys, FaultyCacheStore};
use feedsync::backend::CacheStore;
use feedsync::database::RecordStore;
use feedsync::keys::{EntityKind, IndexScope};
use feedsync::{ErrorKind, FeedSyncManager, SeaOrmRecordStore};
use std::sync::Arc;

const BASE: i64 = 1_700_000_000_000;

async fn setup() -> (FeedSyncManager, Arc<FaultyCacheStore>, Arc<SeaOrmRecordStore>) {
    let records = sqlite_records().await;
    seed_user(records.as_ref(), 1, "alice").await;
    seed_user(records.as_ref(), 2, "bob").await;
    seed_video(records.as_ref(), 500, 1, BASE).await;
    let cache = Arc::new(FaultyCacheStore::new());
    let manager = manager_with(cache.clone(), records.clone());
    (manager, cache, records)
}

#[tokio::test]
async fn test_cache_failure_aborts_comment() {
    let (manager, cache, records) = setup().await;
    // 先让视频快照进入缓存，使存在性检查不需要写缓存
    manager.videos().feed(None, None).await.unwrap();

    cache.fail_writes(true);
    let err = manager
        .coordinator()
        .add_comment(500, 2, "first!")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsistencyAbort);

    cache.fail_writes(false);
    assert!(records.comments_by_video(500).await.unwrap().is_empty());
    let listed = manager.comments().comments(500, None).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_comment_written_to_both_stores() {
    let (manager, cache, records) = setup().await;
    let scope = IndexScope::VideoComments(500);
    // 评论索引先被读取一次，只留下空集合标记
    assert!(manager.comments().comments(500, None).await.unwrap().is_empty());

    let comment = manager
        .coordinator()
        .add_comment(500, 2, "nice video")
        .await
        .unwrap();
    assert_eq!(records.comments_by_video(500).await.unwrap(), vec![comment.clone()]);

    let keys = test_keys();
    assert!(!cache.exists(&keys.empty(scope)).await.unwrap());
    assert!(cache
        .exists(&keys.entity(EntityKind::Comment, comment.comment_id))
        .await
        .unwrap());

    let listed = manager.comments().comments(500, Some(1)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user.user_id, 2);
    assert_eq!(listed[0].content, "nice video");
}

#[tokio::test]
async fn test_mismatched_delete_is_unauthorized() {
    let (manager, cache, records) = setup().await;
    seed_comment(records.as_ref(), 900, 500, 2, BASE + 5).await;
    let before = manager.comments().comments(500, None).await.unwrap();
    assert_eq!(before.len(), 1);

    // 非作者删除
    let err = manager
        .coordinator()
        .delete_comment(1, 500, 900)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // 评论不属于该视频
    let err = manager
        .coordinator()
        .delete_comment(2, 501, 900)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let index = test_keys().index(IndexScope::VideoComments(500));
    assert_eq!(cache.zcard(&index).await.unwrap(), 1);
    assert_eq!(records.comments_by_video(500).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cache_failure_aborts_delete() {
    let (manager, cache, records) = setup().await;
    seed_comment(records.as_ref(), 901, 500, 2, BASE + 5).await;
    manager.comments().comments(500, None).await.unwrap();

    cache.fail_writes(true);
    let err = manager
        .coordinator()
        .delete_comment(2, 500, 901)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsistencyAbort);
    cache.fail_writes(false);

    assert_eq!(records.comments_by_video(500).await.unwrap().len(), 1);
    let listed = manager.comments().comments(500, None).await.unwrap();
    assert_eq!(listed.len(), 1);

    manager.coordinator().delete_comment(2, 500, 901).await.unwrap();
    assert!(manager.comments().comments(500, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_favorite_toggles_and_invalidates_count() {
    let (manager, cache, _records) = setup().await;
    let page = manager.videos().feed(None, Some(2)).await.unwrap();
    assert_eq!(page.videos[0].video.favorite_count, 0);
    assert!(!page.videos[0].is_favorite);

    assert!(manager.coordinator().favorite(2, 500).await.unwrap());
    assert!(!manager.coordinator().favorite(2, 500).await.unwrap());

    let page = manager.videos().feed(None, Some(2)).await.unwrap();
    assert_eq!(page.videos[0].video.favorite_count, 1);
    assert!(page.videos[0].is_favorite);

    cache.fail_writes(true);
    let err = manager.coordinator().unfavorite(2, 500).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsistencyAbort);
    cache.fail_writes(false);

    assert!(manager.coordinator().unfavorite(2, 500).await.unwrap());
    assert!(!manager.coordinator().unfavorite(2, 500).await.unwrap());
    let page = manager.videos().feed(None, Some(2)).await.unwrap();
    assert_eq!(page.videos[0].video.favorite_count, 0);
}

#[tokio::test]
async fn test_follow_relationship() {
    let (manager, _cache, records) = setup().await;
    let coordinator = manager.coordinator();

    assert!(coordinator.follow(2, 1).await.unwrap());
    assert!(!coordinator.follow(2, 1).await.unwrap());
    let err = coordinator.follow(2, 77).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let alice = manager.users().profile(1, Some(2)).await.unwrap();
    assert!(alice.is_follow);
    assert_eq!(alice.stats.follower_count, 1);
    assert_eq!(alice.stats.work_count, 1);
    assert!(records.followed_among(2, &[1]).await.unwrap().contains(&1));

    assert!(coordinator.unfollow(2, 1).await.unwrap());
    assert!(!coordinator.unfollow(2, 1).await.unwrap());
    let alice = manager.users().profile(1, Some(2)).await.unwrap();
    assert!(!alice.is_follow);
}

#[tokio::test]
async fn test_publish_cache_failure_keeps_row() {
    let (manager, cache, records) = setup().await;
    cache.fail_writes(true);
    let err = manager
        .coordinator()
        .publish_video(1, "second", "play", "cover")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsistencyAbort);
    cache.fail_writes(false);

    assert_eq!(records.videos_by_author(1).await.unwrap().len(), 2);
    // 索引从未建立，读取时冷启动可以看到已提交的视频
    let videos = manager.videos().published_videos(1, None).await.unwrap();
    assert_eq!(videos.len(), 2);
}

async fn listed_ids(manager: &FeedSyncManager) -> Vec<u64> {
    let mut ids: Vec<u64> = manager
        .comments()
        .comments(500, None)
        .await
        .unwrap()
        .iter()
        .map(|c| c.comment_id)
        .collect();
    ids.sort_unstable();
    ids
}

async fn stored_ids(records: &SeaOrmRecordStore) -> Vec<u64> {
    let mut ids: Vec<u64> = records
        .comments_by_video(500)
        .await
        .unwrap()
        .iter()
        .map(|c| c.comment_id)
        .collect();
    ids.sort_unstable();
    ids
}

/// 缓存步骤在任一命令处失败后，列表与库中的评论一致，且不残留快照
#[tokio::test]
async fn test_add_comment_partial_cache_failure_leaves_no_ghost() {
    let (manager, cache, records) = setup().await;
    seed_comment(records.as_ref(), 900, 500, 2, BASE + 5).await;
    assert_eq!(listed_ids(&manager).await, vec![900]);

    let keys = test_keys();
    let steps = [
        ("hset_all", ":comment:"),
        ("delete", ":empty:"),
        ("zadd_if_exists", ":video_comments:"),
        ("hdel", ":video:"),
    ];
    for (attempt, (op, fragment)) in steps.into_iter().enumerate() {
        cache.fail_op(op, fragment);
        let err = manager
            .coordinator()
            .add_comment(500, 2, "lost")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConsistencyAbort, "{}", op);
        cache.heal();

        let minted = 10_000 + attempt as u64;
        assert!(
            !cache.exists(&keys.entity(EntityKind::Comment, minted)).await.unwrap(),
            "{}",
            op
        );
        assert_eq!(listed_ids(&manager).await, stored_ids(&records).await, "{}", op);
    }
    assert_eq!(stored_ids(&records).await, vec![900]);
}

/// 删除回滚后评论仍在库中，列表必须还能看到它
#[tokio::test]
async fn test_delete_comment_partial_cache_failure_keeps_comment_listed() {
    let (manager, cache, records) = setup().await;
    seed_comment(records.as_ref(), 901, 500, 2, BASE + 5).await;
    seed_comment(records.as_ref(), 902, 500, 1, BASE + 6).await;
    assert_eq!(listed_ids(&manager).await, vec![901, 902]);

    let steps = [
        ("zrem", ":video_comments:"),
        ("delete", ":comment:"),
        ("hdel", ":video:"),
    ];
    for (op, fragment) in steps {
        cache.fail_op(op, fragment);
        let err = manager
            .coordinator()
            .delete_comment(2, 500, 901)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConsistencyAbort, "{}", op);
        cache.heal();

        assert_eq!(stored_ids(&records).await, vec![901, 902], "{}", op);
        assert_eq!(listed_ids(&manager).await, vec![901, 902], "{}", op);
    }

    manager.coordinator().delete_comment(2, 500, 901).await.unwrap();
    assert_eq!(listed_ids(&manager).await, vec![902]);
    assert_eq!(stored_ids(&records).await, vec![902]);
}
