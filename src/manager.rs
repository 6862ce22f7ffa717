//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步层管理器，负责按配置装配存储、缓存组件和业务服务。

use crate::backend::{connect_cache_store, CacheStore};
use crate::cache::{CountAggregator, EntityCache, IndexCache};
use crate::config::Config;
use crate::database::{RecordStore, SeaOrmRecordStore};
use crate::error::{Result, SyncError};
use crate::id::{ClockIdGenerator, IdGenerator};
use crate::keys::KeyScheme;
use crate::metrics::Metrics;
use crate::service::{CommentService, ConsistencyCoordinator, UserService, VideoService};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 存储健康状态
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub cache: String,
    pub database: String,
}

impl StoreStatus {
    pub fn is_healthy(&self) -> bool {
        self.cache == "ok" && self.database == "ok"
    }
}

/// 同步层管理器
///
/// 所有依赖都通过构造参数传入，不存在进程级单例
pub struct FeedSyncManager {
    config: Config,
    cache: Arc<dyn CacheStore>,
    records: Arc<dyn RecordStore>,
    metrics: Arc<Metrics>,
    coordinator: ConsistencyCoordinator,
    videos: VideoService,
    comments: CommentService,
    users: UserService,
    counts: CountAggregator,
}

impl FeedSyncManager {
    /// 根据配置连接存储并装配
    ///
    /// 连接关系型存储后执行建表迁移
    #[instrument(skip(config), level = "info")]
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate().map_err(SyncError::Configuration)?;
        let cache = connect_cache_store(&config.cache).await?;
        let records = SeaOrmRecordStore::connect(&config.database).await?;
        records.migrate().await?;
        info!("Stores connected, cache backend {:?}", config.cache.backend);
        Ok(Self::with_stores(
            config,
            cache,
            Arc::new(records),
            Arc::new(ClockIdGenerator::new()),
        ))
    }

    /// 使用已有的存储装配
    pub fn with_stores(
        config: Config,
        cache: Arc<dyn CacheStore>,
        records: Arc<dyn RecordStore>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let keys = KeyScheme::from_config(&config);
        let metrics = Arc::new(Metrics::new());

        let users = UserService::new(records.clone(), ids.clone());
        let counts = CountAggregator::new(cache.clone(), records.clone(), keys.clone(), metrics.clone());
        let videos = VideoService::new(
            IndexCache::new(cache.clone(), records.clone(), keys.clone(), metrics.clone()),
            counts.clone(),
            users.clone(),
            records.clone(),
            config.limits.feed_page_size,
        );
        let comments = CommentService::new(
            IndexCache::new(cache.clone(), records.clone(), keys.clone(), metrics.clone()),
            EntityCache::new(cache.clone(), records.clone(), keys.clone(), metrics.clone()),
            users.clone(),
        );
        let coordinator = ConsistencyCoordinator::new(
            cache.clone(),
            records.clone(),
            ids,
            keys,
            config.limits.clone(),
            metrics.clone(),
        );

        Self {
            config,
            cache,
            records,
            metrics,
            coordinator,
            videos,
            comments,
            users,
            counts,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &ConsistencyCoordinator {
        &self.coordinator
    }

    pub fn videos(&self) -> &VideoService {
        &self.videos
    }

    pub fn comments(&self) -> &CommentService {
        &self.comments
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn counts(&self) -> &CountAggregator {
        &self.counts
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn record_store(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// 检查两个存储的连通性
    pub async fn status(&self) -> StoreStatus {
        let cache = match self.cache.ping().await {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                warn!("Cache store ping failed: {}", e);
                e.to_string()
            }
        };
        let database = match self.records.ping().await {
            Ok(()) => "ok".to_string(),
            Err(e) => {
                warn!("Record store ping failed: {}", e);
                e.to_string()
            }
        };
        StoreStatus { cache, database }
    }
}
