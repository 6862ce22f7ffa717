//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和故障注入存储。

#![allow(dead_code)]

use async_trait::async_trait;
use feedsync::backend::{CacheStore, HashWrite, MemoryCacheStore};
use feedsync::config::{CacheBackendType, Config, DatabaseConfig, TtlConfig};
use feedsync::database::{RecordStore, RecordTx, SeaOrmRecordStore};
use feedsync::error::{Result, SyncError};
use feedsync::id::IdGenerator;
use feedsync::keys::KeyScheme;
use feedsync::metrics::Metrics;
use feedsync::model::{datetime_from_millis, Comment, FollowEdge, User, UserStats, Video};
use feedsync::FeedSyncManager;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use feedsync::utils::setup_logging;

/// 测试用TTL配置，关闭抖动
pub fn test_ttl() -> TtlConfig {
    TtlConfig {
        jitter_secs: 0,
        ..TtlConfig::default()
    }
}

pub fn test_keys() -> KeyScheme {
    KeyScheme::new("test", test_ttl())
}

/// 内存缓存加内存SQLite的测试配置
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.cache.backend = CacheBackendType::Memory;
    config.cache.key_prefix = "test".to_string();
    config.ttl = test_ttl();
    config
}

/// 已完成建表的内存SQLite存储
pub async fn sqlite_records() -> Arc<SeaOrmRecordStore> {
    setup_logging();
    let records = SeaOrmRecordStore::connect(&DatabaseConfig::default())
        .await
        .expect("in-memory sqlite should connect");
    records.migrate().await.expect("migration should succeed");
    Arc::new(records)
}

pub fn metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new())
}

/// 从给定值开始递增的ID生成器
pub struct SequenceIds {
    next: AtomicU64,
}

impl SequenceIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> Result<u64> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// 用给定的存储装配管理器
pub fn manager_with(
    cache: Arc<dyn CacheStore>,
    records: Arc<dyn RecordStore>,
) -> FeedSyncManager {
    FeedSyncManager::with_stores(
        test_config(),
        cache,
        records,
        Arc::new(SequenceIds::starting_at(10_000)),
    )
}

pub async fn seed_user(records: &dyn RecordStore, user_id: u64, name: &str) {
    records
        .insert_user(&User {
            user_id,
            name: name.to_string(),
            created_at: datetime_from_millis(1_700_000_000_000).unwrap(),
        })
        .await
        .unwrap();
}

pub async fn seed_video(records: &dyn RecordStore, video_id: u64, author_id: u64, created_ms: i64) -> Video {
    let video = Video::new(
        video_id,
        author_id,
        format!("video {}", video_id),
        format!("https://cdn.example.com/{}.mp4", video_id),
        format!("https://cdn.example.com/{}.jpg", video_id),
        datetime_from_millis(created_ms).unwrap(),
    );
    records.insert_video(&video).await.unwrap();
    video
}

pub async fn seed_comment(
    records: &dyn RecordStore,
    comment_id: u64,
    video_id: u64,
    user_id: u64,
    created_ms: i64,
) -> Comment {
    let comment = Comment {
        comment_id,
        video_id,
        user_id,
        content: format!("comment {}", comment_id),
        created_at: datetime_from_millis(created_ms).unwrap(),
    };
    let mut tx = records.begin().await.unwrap();
    tx.insert_comment(&comment).await.unwrap();
    tx.commit().await.unwrap();
    comment
}

pub async fn seed_favorite(records: &dyn RecordStore, user_id: u64, video_id: u64) {
    let mut tx = records.begin().await.unwrap();
    assert!(tx.insert_favorite(user_id, video_id).await.unwrap());
    tx.commit().await.unwrap();
}

fn injected(what: &str) -> SyncError {
    SyncError::BackendError(format!("injected {} failure", what))
}

/// 可注入读取故障的关系型存储，同时统计读取次数
pub struct FaultyRecordStore {
    inner: Arc<dyn RecordStore>,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
}

impl FaultyRecordStore {
    pub fn new(inner: Arc<dyn RecordStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("record read"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FaultyRecordStore {
    async fn videos_by_ids(&self, ids: &[u64]) -> Result<Vec<Video>> {
        self.read()?;
        self.inner.videos_by_ids(ids).await
    }

    async fn videos_by_author(&self, author_id: u64) -> Result<Vec<Video>> {
        self.read()?;
        self.inner.videos_by_author(author_id).await
    }

    async fn all_videos(&self) -> Result<Vec<Video>> {
        self.read()?;
        self.inner.all_videos().await
    }

    async fn insert_video(&self, video: &Video) -> Result<()> {
        self.inner.insert_video(video).await
    }

    async fn comments_by_ids(&self, ids: &[u64]) -> Result<Vec<Comment>> {
        self.read()?;
        self.inner.comments_by_ids(ids).await
    }

    async fn comments_by_video(&self, video_id: u64) -> Result<Vec<Comment>> {
        self.read()?;
        self.inner.comments_by_video(video_id).await
    }

    async fn comment_counts(&self, video_ids: &[u64]) -> Result<HashMap<u64, i64>> {
        self.read()?;
        self.inner.comment_counts(video_ids).await
    }

    async fn favorite_counts(&self, video_ids: &[u64]) -> Result<HashMap<u64, i64>> {
        self.read()?;
        self.inner.favorite_counts(video_ids).await
    }

    async fn favorited_videos(&self, user_id: u64, video_ids: &[u64]) -> Result<HashSet<u64>> {
        self.read()?;
        self.inner.favorited_videos(user_id, video_ids).await
    }

    async fn users_by_ids(&self, ids: &[u64]) -> Result<Vec<User>> {
        self.read()?;
        self.inner.users_by_ids(ids).await
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        self.inner.insert_user(user).await
    }

    async fn user_stats(&self, user_ids: &[u64]) -> Result<HashMap<u64, UserStats>> {
        self.read()?;
        self.inner.user_stats(user_ids).await
    }

    async fn followed_among(&self, from_user_id: u64, user_ids: &[u64]) -> Result<HashSet<u64>> {
        self.read()?;
        self.inner.followed_among(from_user_id, user_ids).await
    }

    async fn begin(&self) -> Result<Box<dyn RecordTx>> {
        self.inner.begin().await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// 可注入写入故障的缓存存储，读取始终委托给内存实现
///
/// `fail_writes` 使所有写入失败；`fail_op` 只让指定命令在键包含给定片段时失败，
/// 用于让一次缓存步骤在中途失败
pub struct FaultyCacheStore {
    inner: MemoryCacheStore,
    fail_writes: AtomicBool,
    rule: Mutex<Option<(&'static str, String)>>,
}

impl FaultyCacheStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            fail_writes: AtomicBool::new(false),
            rule: Mutex::new(None),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 让命令 `op`（如 "hdel"）在键包含 `key_fragment` 时失败
    pub fn fail_op(&self, op: &'static str, key_fragment: &str) {
        *self.rule.lock().unwrap() = Some((op, key_fragment.to_string()));
    }

    /// 清除所有故障注入
    pub fn heal(&self) {
        self.fail_writes(false);
        *self.rule.lock().unwrap() = None;
    }

    fn write(&self, op: &str, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("cache write"));
        }
        if let Some((rule_op, fragment)) = self.rule.lock().unwrap().as_ref() {
            if *rule_op == op && key.contains(fragment.as_str()) {
                return Err(injected(op));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FaultyCacheStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<()> {
        self.write("set_flag", key)?;
        self.inner.set_flag(key, ttl).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.write("delete", key)?;
        self.inner.delete(key).await
    }

    async fn hset_all(&self, key: &str, fields: &[(String, String)], ttl: Duration) -> Result<()> {
        self.write("hset_all", key)?;
        self.inner.hset_all(key, fields, ttl).await
    }

    async fn pipeline_hset_batch(&self, items: Vec<HashWrite>) -> Result<()> {
        for (key, _, _) in &items {
            self.write("pipeline_hset_batch", key)?;
        }
        self.inner.pipeline_hset_batch(items).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hget(key, field).await
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.inner.hget_all(key).await
    }

    async fn pipeline_hget_all(
        &self,
        items: &[(String, Duration)],
    ) -> Result<Vec<HashMap<String, String>>> {
        self.inner.pipeline_hget_all(items).await
    }

    async fn hset_if_exists(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.write("hset_if_exists", key)?;
        self.inner.hset_if_exists(key, field, value).await
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        self.write("hdel", key)?;
        self.inner.hdel(key, field).await
    }

    async fn zadd(&self, key: &str, members: &[(f64, String)], ttl: Duration) -> Result<()> {
        self.write("zadd", key)?;
        self.inner.zadd(key, members, ttl).await
    }

    async fn zadd_if_exists(&self, key: &str, score: f64, member: &str, ttl: Duration) -> Result<bool> {
        self.write("zadd_if_exists", key)?;
        self.inner.zadd_if_exists(key, score, member, ttl).await
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        self.write("zrem", key)?;
        self.inner.zrem(key, member).await
    }

    async fn zrevrange(&self, key: &str) -> Result<Vec<String>> {
        self.inner.zrevrange(key).await
    }

    async fn zrevrange_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.inner.zrevrange_by_score(key, max, min, limit).await
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.inner.zcard(key).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}
