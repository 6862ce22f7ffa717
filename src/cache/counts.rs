//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了视频计数（评论数、点赞数）的批量聚合。

use crate::backend::CacheStore;
use crate::database::RecordStore;
use crate::error::Result;
use crate::keys::{EntityKind, IndexScope, KeyScheme};
use crate::metrics::Metrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 计数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountKind {
    Comment,
    Favorite,
}

impl CountKind {
    /// 视频快照中的字段名
    pub fn field(&self) -> &'static str {
        match self {
            CountKind::Comment => "comment_count",
            CountKind::Favorite => "favorite_count",
        }
    }
}

/// 计数聚合器
///
/// 命中路径读取视频快照中的计数字段；未命中的ID合并为一次分组查询，
/// 查询结果只写回已存在的快照。
#[derive(Clone)]
pub struct CountAggregator {
    cache: Arc<dyn CacheStore>,
    records: Arc<dyn RecordStore>,
    keys: KeyScheme,
    metrics: Arc<Metrics>,
}

impl CountAggregator {
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
        }
    }

    fn component(kind: CountKind) -> String {
        format!("counts:{}", kind.field())
    }

    /// 从缓存读取单个计数
    async fn cached_count(&self, kind: CountKind, video_id: u64) -> Result<Option<i64>> {
        let snapshot_key = self.keys.entity(EntityKind::Video, video_id);
        if let Some(raw) = self.cache.hget(&snapshot_key, kind.field()).await? {
            match raw.parse::<i64>() {
                Ok(count) => return Ok(Some(count)),
                Err(_) => warn!("Ignoring malformed {} in {}", kind.field(), snapshot_key),
            }
        }

        if kind == CountKind::Comment {
            // 评论作用域的空集合标记或存活的评论索引同样可以给出评论数
            let scope = IndexScope::VideoComments(video_id);
            if self.cache.exists(&self.keys.empty(scope)).await? {
                return Ok(Some(0));
            }
            let cardinality = self.cache.zcard(&self.keys.index(scope)).await?;
            if cardinality > 0 {
                return Ok(Some(cardinality as i64));
            }
        }
        Ok(None)
    }

    /// 批量获取计数，输出与输入等长且顺序一致
    #[instrument(skip(self, video_ids), level = "debug", fields(count = video_ids.len()))]
    pub async fn get_counts(&self, kind: CountKind, video_ids: &[u64]) -> Result<Vec<i64>> {
        let component = Self::component(kind);
        let mut resolved: HashMap<u64, i64> = HashMap::with_capacity(video_ids.len());
        let mut misses: Vec<u64> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::with_capacity(video_ids.len());

        for video_id in video_ids {
            if !seen.insert(*video_id) {
                continue;
            }
            match self.cached_count(kind, *video_id).await? {
                Some(count) => {
                    resolved.insert(*video_id, count);
                }
                None => misses.push(*video_id),
            }
        }
        self.metrics
            .record_n(&component, "get_counts", "hit", resolved.len() as u64);

        if !misses.is_empty() {
            self.metrics
                .record_n(&component, "get_counts", "miss", misses.len() as u64);
            let grouped = match kind {
                CountKind::Comment => self.records.comment_counts(&misses).await?,
                CountKind::Favorite => self.records.favorite_counts(&misses).await?,
            };
            debug!(
                "Grouped {} query resolved {} of {} videos",
                kind.field(),
                grouped.len(),
                misses.len()
            );
            for video_id in misses {
                let count = grouped.get(&video_id).copied().unwrap_or(0);
                self.cache
                    .hset_if_exists(
                        &self.keys.entity(EntityKind::Video, video_id),
                        kind.field(),
                        &count.to_string(),
                    )
                    .await?;
                resolved.insert(video_id, count);
            }
        }

        Ok(video_ids
            .iter()
            .map(|id| resolved.get(id).copied().unwrap_or(0))
            .collect())
    }

    /// 丢弃缓存的计数，下一次读取时重新统计
    #[instrument(skip(self), level = "debug")]
    pub async fn invalidate(&self, kind: CountKind, video_id: u64) -> Result<()> {
        self.cache
            .hdel(&self.keys.entity(EntityKind::Video, video_id), kind.field())
            .await
    }
}
