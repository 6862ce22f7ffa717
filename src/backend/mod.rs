//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存存储的抽象接口及其实现（Redis 与进程内存）。

pub mod memory;
pub mod redis_provider;
pub mod redis_store;

use crate::config::{CacheBackendType, CacheConfig};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;

/// 一次哈希写入：键、字段列表、过期时间
pub type HashWrite = (String, Vec<(String, String)>, Duration);

/// 缓存存储接口
///
/// 支持三种数据形态：存在标记、哈希（实体快照）、有序集合（时间索引）。
/// 所有写入都带有过期时间；所有错误都向上传递，不会被当作"不存在"处理。
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 检查键是否存在
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 写入存在标记
    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<()>;

    /// 刷新过期时间，键不存在时返回 false
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 删除键
    async fn delete(&self, key: &str) -> Result<()>;

    /// 写入哈希字段并设置过期时间
    async fn hset_all(&self, key: &str, fields: &[(String, String)], ttl: Duration)
        -> Result<()>;

    /// 批量写入多个哈希
    async fn pipeline_hset_batch(&self, items: Vec<HashWrite>) -> Result<()>;

    /// 读取单个哈希字段
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// 读取全部哈希字段，键不存在时返回空表
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// 批量读取哈希并刷新过期时间，结果与输入一一对应，不存在的键对应空表
    async fn pipeline_hget_all(
        &self,
        items: &[(String, Duration)],
    ) -> Result<Vec<HashMap<String, String>>>;

    /// 仅当键存在时写入哈希字段，避免产生没有过期时间的残缺快照
    async fn hset_if_exists(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    /// 删除哈希字段
    async fn hdel(&self, key: &str, field: &str) -> Result<()>;

    /// 向有序集合添加成员并设置过期时间
    async fn zadd(&self, key: &str, members: &[(f64, String)], ttl: Duration) -> Result<()>;

    /// 仅当有序集合已存在时添加成员，并刷新过期时间
    async fn zadd_if_exists(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// 删除有序集合成员
    async fn zrem(&self, key: &str, member: &str) -> Result<bool>;

    /// 按分值从高到低返回全部成员
    async fn zrevrange(&self, key: &str) -> Result<Vec<String>>;

    /// 按分值从高到低返回 `[min, max]` 区间内至多 `limit` 个成员
    async fn zrevrange_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// 有序集合成员数
    async fn zcard(&self, key: &str) -> Result<u64>;

    /// 检查连接是否正常
    async fn ping(&self) -> Result<()>;
}

/// 根据配置创建缓存存储
pub async fn connect_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackendType::Redis => Ok(Arc::new(RedisCacheStore::connect(config).await?)),
        CacheBackendType::Memory => Ok(Arc::new(MemoryCacheStore::new())),
    }
}
