//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按创建时间排序的ID索引缓存。

use super::entity::{CachedEntity, EntityCache};
use crate::backend::CacheStore;
use crate::database::RecordStore;
use crate::error::Result;
use crate::keys::{IndexScope, KeyScheme, TtlClass};
use crate::metrics::Metrics;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 索引读取窗口
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    /// 全部成员，从新到旧
    All,
    /// 分值不大于 `max_score` 的至多 `limit` 个成员，从新到旧
    Before { max_score: f64, limit: usize },
}

impl Window {
    /// 推送流窗口：创建时间不晚于 `latest_time_ms - 2` 毫秒的视频
    ///
    /// 落在 `(latest_time_ms - 2, latest_time_ms)` 之间的视频被跳过
    pub fn feed(latest_time_ms: i64, limit: usize) -> Self {
        Window::Before {
            max_score: (latest_time_ms - 2) as f64 / 1000.0,
            limit,
        }
    }

    fn apply<T: CachedEntity>(&self, mut entities: Vec<T>) -> Vec<T> {
        // 稳定排序，同一时间的实体保持回源顺序
        entities.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
        match self {
            Window::All => entities,
            Window::Before { max_score, limit } => entities
                .into_iter()
                .filter(|e| e.score() <= *max_score)
                .take(*limit)
                .collect(),
        }
    }
}

/// 时间索引缓存
///
/// 每个作用域对应一个有序集合。读取顺序：
/// 空集合标记 → 索引（刷新过期时间后按窗口读取）→ 回源并冷启动填充。
pub struct IndexCache<T: CachedEntity> {
    cache: Arc<dyn CacheStore>,
    records: Arc<dyn RecordStore>,
    entities: EntityCache<T>,
    keys: KeyScheme,
    metrics: Arc<Metrics>,
}

impl<T: CachedEntity> Clone for IndexCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            records: self.records.clone(),
            entities: self.entities.clone(),
            keys: self.keys.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<T: CachedEntity> IndexCache<T> {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        records: Arc<dyn RecordStore>,
        keys: KeyScheme,
        metrics: Arc<Metrics>,
    ) -> Self {
        let entities = EntityCache::new(cache.clone(), records.clone(), keys.clone(), metrics.clone());
        Self {
            cache,
            records,
            entities,
            keys,
            metrics,
        }
    }

    fn component(scope: IndexScope) -> String {
        format!("index:{}", scope.label())
    }

    /// 按窗口读取作用域内的实体，从新到旧
    #[instrument(skip(self), level = "debug", fields(scope = %scope))]
    pub async fn read(&self, scope: IndexScope, window: Window) -> Result<Vec<T>> {
        let start = std::time::Instant::now();
        let component = Self::component(scope);

        if self.cache.exists(&self.keys.empty(scope)).await? {
            debug!("Scope {} is known to be empty", scope);
            self.metrics.record(&component, "read", "negative");
            return Ok(Vec::new());
        }

        let index_key = self.keys.index(scope);
        let result = if self
            .cache
            .expire(&index_key, self.keys.ttl(scope.ttl_class()))
            .await?
        {
            let members = match window {
                Window::All => self.cache.zrevrange(&index_key).await?,
                Window::Before { max_score, limit } => {
                    self.cache
                        .zrevrange_by_score(&index_key, max_score, 0.0, limit)
                        .await?
                }
            };
            let ids: Vec<u64> = members
                .iter()
                .filter_map(|member| match member.parse::<u64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!("Ignoring malformed member '{}' in {}", member, index_key);
                        None
                    }
                })
                .collect();
            self.metrics.record(&component, "read", "hit");
            self.entities.get_batch(&ids).await?
        } else {
            self.metrics.record(&component, "read", "cold");
            self.cold_start(scope, window).await?
        };

        self.metrics
            .record_duration(&component, "read", start.elapsed().as_secs_f64());
        Ok(result)
    }

    async fn cold_start(&self, scope: IndexScope, window: Window) -> Result<Vec<T>> {
        let entities = T::load_scope(self.records.as_ref(), scope).await?;
        if entities.is_empty() {
            self.cache
                .set_flag(&self.keys.empty(scope), self.keys.ttl(TtlClass::Empty))
                .await?;
            info!("Scope {} is empty, negative marker recorded", scope);
            return Ok(Vec::new());
        }
        self.populate(scope, &entities).await?;
        info!("Cold start populated {} with {} members", scope, entities.len());
        Ok(window.apply(entities))
    }

    /// 用完整的成员列表填充索引，并写入每个成员的快照
    #[instrument(skip(self, entities), level = "debug", fields(scope = %scope, count = entities.len()))]
    pub async fn populate(&self, scope: IndexScope, entities: &[T]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let members: Vec<(f64, String)> = entities
            .iter()
            .map(|e| (e.score(), e.id().to_string()))
            .collect();
        self.cache
            .zadd(
                &self.keys.index(scope),
                &members,
                self.keys.ttl(scope.ttl_class()),
            )
            .await?;
        self.entities.put_many(entities).await
    }

    /// 追加成员
    ///
    /// 先清除空集合标记；索引不存在时不会创建残缺索引，返回 false，
    /// 下一次读取将从数据库完整加载
    #[instrument(skip(self, entity), level = "debug", fields(scope = %scope, id = entity.id()))]
    pub async fn append(&self, scope: IndexScope, entity: &T) -> Result<bool> {
        self.cache.delete(&self.keys.empty(scope)).await?;
        self.cache
            .zadd_if_exists(
                &self.keys.index(scope),
                entity.score(),
                &entity.id().to_string(),
                self.keys.ttl(scope.ttl_class()),
            )
            .await
    }

    /// 移除成员，返回成员是否存在
    #[instrument(skip(self), level = "debug", fields(scope = %scope))]
    pub async fn remove(&self, scope: IndexScope, id: u64) -> Result<bool> {
        self.cache
            .zrem(&self.keys.index(scope), &id.to_string())
            .await
    }

    /// 删除整个索引，下一次读取时重建
    #[instrument(skip(self), level = "debug", fields(scope = %scope))]
    pub async fn invalidate(&self, scope: IndexScope) -> Result<()> {
        self.cache.delete(&self.keys.index(scope)).await
    }

    pub fn entities(&self) -> &EntityCache<T> {
        &self.entities
    }
}
