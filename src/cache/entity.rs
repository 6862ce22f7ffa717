//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了实体快照的旁路缓存读写。

use crate::backend::{CacheStore, HashWrite};
use crate::database::RecordStore;
use crate::error::{Result, SyncError};
use crate::keys::{EntityKind, IndexScope, KeyScheme, TtlClass};
use crate::metrics::Metrics;
use crate::model::{datetime_from_millis, time_score, Comment, Video};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 可缓存为哈希快照的实体
#[async_trait]
pub trait CachedEntity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;
    const TTL_CLASS: TtlClass;

    fn id(&self) -> u64;

    /// 在索引中的分值（创建时间）
    fn score(&self) -> f64;

    /// 快照字段，创建时间保存为毫秒时间戳字符串
    fn to_fields(&self) -> Vec<(String, String)>;

    /// 从快照字段重建实体
    fn from_fields(id: u64, fields: &HashMap<String, String>) -> Result<Self>;

    /// 按ID批量回源
    async fn load_batch(records: &dyn RecordStore, ids: &[u64]) -> Result<Vec<Self>>;

    /// 加载某个作用域下的全部实体，按创建时间从新到旧
    async fn load_scope(records: &dyn RecordStore, scope: IndexScope) -> Result<Vec<Self>>;
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| SyncError::Serialization(format!("snapshot field '{}' missing", name)))
}

fn parse_field<T: std::str::FromStr>(fields: &HashMap<String, String>, name: &str) -> Result<T> {
    let raw = field(fields, name)?;
    raw.parse::<T>().map_err(|_| {
        SyncError::Serialization(format!("snapshot field '{}' is malformed: {}", name, raw))
    })
}

fn scope_mismatch(kind: EntityKind, scope: IndexScope) -> SyncError {
    SyncError::Validation(format!(
        "{} entities cannot be indexed under scope {}",
        kind.as_str(),
        scope
    ))
}

#[async_trait]
impl CachedEntity for Video {
    const KIND: EntityKind = EntityKind::Video;
    const TTL_CLASS: TtlClass = TtlClass::Video;

    fn id(&self) -> u64 {
        self.video_id
    }

    fn score(&self) -> f64 {
        time_score(&self.created_at)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("author_id".to_string(), self.author_id.to_string()),
            ("title".to_string(), self.title.clone()),
            ("play_url".to_string(), self.play_url.clone()),
            ("cover_url".to_string(), self.cover_url.clone()),
            (
                "created_at".to_string(),
                self.created_at.timestamp_millis().to_string(),
            ),
        ]
    }

    fn from_fields(id: u64, fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Video::new(
            id,
            parse_field::<u64>(fields, "author_id")?,
            field(fields, "title")?,
            field(fields, "play_url")?,
            field(fields, "cover_url")?,
            datetime_from_millis(parse_field::<i64>(fields, "created_at")?)?,
        ))
    }

    async fn load_batch(records: &dyn RecordStore, ids: &[u64]) -> Result<Vec<Self>> {
        records.videos_by_ids(ids).await
    }

    async fn load_scope(records: &dyn RecordStore, scope: IndexScope) -> Result<Vec<Self>> {
        match scope {
            IndexScope::GlobalFeed => records.all_videos().await,
            IndexScope::UserPublish(user_id) => records.videos_by_author(user_id).await,
            IndexScope::VideoComments(_) => Err(scope_mismatch(Self::KIND, scope)),
        }
    }
}

#[async_trait]
impl CachedEntity for Comment {
    const KIND: EntityKind = EntityKind::Comment;
    const TTL_CLASS: TtlClass = TtlClass::Comment;

    fn id(&self) -> u64 {
        self.comment_id
    }

    fn score(&self) -> f64 {
        time_score(&self.created_at)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("video_id".to_string(), self.video_id.to_string()),
            ("user_id".to_string(), self.user_id.to_string()),
            ("content".to_string(), self.content.clone()),
            (
                "created_at".to_string(),
                self.created_at.timestamp_millis().to_string(),
            ),
        ]
    }

    fn from_fields(id: u64, fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Comment {
            comment_id: id,
            video_id: parse_field(fields, "video_id")?,
            user_id: parse_field(fields, "user_id")?,
            content: field(fields, "content")?.to_string(),
            created_at: datetime_from_millis(parse_field(fields, "created_at")?)?,
        })
    }

    async fn load_batch(records: &dyn RecordStore, ids: &[u64]) -> Result<Vec<Self>> {
        records.comments_by_ids(ids).await
    }

    async fn load_scope(records: &dyn RecordStore, scope: IndexScope) -> Result<Vec<Self>> {
        match scope {
            IndexScope::VideoComments(video_id) => records.comments_by_video(video_id).await,
            _ => Err(scope_mismatch(Self::KIND, scope)),
        }
    }
}

/// 实体快照缓存
///
/// 读路径：快照命中直接重建；未命中的ID合并为一次批量回源，
/// 回源结果在返回前写回缓存。缓存存储的错误一律向上传递。
pub struct EntityCache<T: CachedEntity> {
    cache: Arc<dyn CacheStore>,
    records: Arc<dyn RecordStore>,
    keys: KeyScheme,
    metrics: Arc<Metrics>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CachedEntity> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            records: self.records.clone(),
            keys: self.keys.clone(),
            metrics: self.metrics.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: CachedEntity> EntityCache<T> {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        records: Arc<dyn RecordStore>,
        keys: KeyScheme,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cache,
            records,
            keys,
            metrics,
            _marker: PhantomData,
        }
    }

    fn component() -> String {
        format!("entity:{}", T::KIND.as_str())
    }

    fn key(&self, id: u64) -> String {
        self.keys.entity(T::KIND, id)
    }

    fn ttl(&self) -> Duration {
        self.keys.ttl(T::TTL_CLASS)
    }

    /// 读取单个快照并刷新其过期时间
    ///
    /// 未命中时返回 `None`，不会回源
    #[instrument(skip(self), level = "debug", fields(kind = T::KIND.as_str()))]
    pub async fn get(&self, id: u64) -> Result<Option<T>> {
        let key = self.key(id);
        let fields = self.cache.hget_all(&key).await?;
        if fields.is_empty() {
            self.metrics.record(&Self::component(), "get", "miss");
            return Ok(None);
        }
        match T::from_fields(id, &fields) {
            Ok(entity) => {
                self.cache.expire(&key, self.ttl()).await?;
                self.metrics.record(&Self::component(), "get", "hit");
                Ok(Some(entity))
            }
            Err(e) => {
                warn!("Discarding unreadable snapshot {}: {}", key, e);
                self.metrics.record(&Self::component(), "get", "miss");
                Ok(None)
            }
        }
    }

    /// 写入快照，重复写入以最后一次为准
    #[instrument(skip(self, entity), level = "debug", fields(kind = T::KIND.as_str(), id = entity.id()))]
    pub async fn put(&self, entity: &T) -> Result<()> {
        self.cache
            .hset_all(&self.key(entity.id()), &entity.to_fields(), self.ttl())
            .await
    }

    /// 一次往返写入多个快照
    #[instrument(skip(self, entities), level = "debug", fields(kind = T::KIND.as_str(), count = entities.len()))]
    pub async fn put_many(&self, entities: &[T]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let items: Vec<HashWrite> = entities
            .iter()
            .map(|entity| (self.key(entity.id()), entity.to_fields(), self.ttl()))
            .collect();
        self.cache.pipeline_hset_batch(items).await
    }

    /// 删除快照
    #[instrument(skip(self), level = "debug", fields(kind = T::KIND.as_str()))]
    pub async fn invalidate(&self, id: u64) -> Result<()> {
        self.cache.delete(&self.key(id)).await
    }

    /// 批量读取，输出顺序与请求顺序一致
    ///
    /// 缓存和数据库都不存在的ID不会出现在结果中
    #[instrument(skip(self, ids), level = "debug", fields(kind = T::KIND.as_str(), count = ids.len()))]
    pub async fn get_batch(&self, ids: &[u64]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let start = std::time::Instant::now();
        let component = Self::component();

        let items: Vec<(String, Duration)> =
            ids.iter().map(|id| (self.key(*id), self.ttl())).collect();
        let snapshots = self.cache.pipeline_hget_all(&items).await?;

        let mut found: HashMap<u64, T> = HashMap::with_capacity(ids.len());
        let mut misses: Vec<u64> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::with_capacity(ids.len());
        for (id, fields) in ids.iter().zip(snapshots.iter()) {
            if !seen.insert(*id) {
                continue;
            }
            if fields.is_empty() {
                misses.push(*id);
                continue;
            }
            match T::from_fields(*id, fields) {
                Ok(entity) => {
                    found.insert(*id, entity);
                }
                Err(e) => {
                    warn!("Discarding unreadable snapshot {}: {}", self.key(*id), e);
                    misses.push(*id);
                }
            }
        }
        self.metrics
            .record_n(&component, "get_batch", "hit", found.len() as u64);
        self.metrics
            .record_n(&component, "get_batch", "miss", misses.len() as u64);

        if !misses.is_empty() {
            debug!("Resolving {} {} misses from store", misses.len(), T::KIND.as_str());
            let loaded = T::load_batch(self.records.as_ref(), &misses).await?;
            self.put_many(&loaded).await?;
            for entity in loaded {
                found.insert(entity.id(), entity);
            }
        }

        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            match found.get(id) {
                Some(entity) => result.push(entity.clone()),
                None => {
                    warn!("{} {} is unknown to cache and store", T::KIND.as_str(), id);
                    self.metrics.record(&component, "get_batch", "dropped");
                }
            }
        }
        self.metrics
            .record_duration(&component, "get_batch", start.elapsed().as_secs_f64());
        Ok(result)
    }
}
