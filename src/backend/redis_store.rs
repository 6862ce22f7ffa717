//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的缓存存储实现。

use super::redis_provider::{DefaultRedisProvider, RedisProvider};
use super::{CacheStore, HashWrite};
use crate::config::CacheConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// 仅当键存在时写入哈希字段
const HSET_IF_EXISTS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
    return 1
end
return 0
"#;

/// 仅当有序集合存在时添加成员并刷新过期时间
const ZADD_IF_EXISTS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('ZADD', KEYS[1], ARGV[1], ARGV[2])
    redis.call('EXPIRE', KEYS[1], ARGV[3])
    return 1
end
return 0
"#;

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Redis缓存存储
///
/// 每条命令都受 `command_timeout_ms` 约束，超时以 [`SyncError::Timeout`] 返回
#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
    command_timeout_ms: u64,
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("command_timeout_ms", &self.command_timeout_ms)
            .finish()
    }
}

impl RedisCacheStore {
    /// 使用默认提供者连接Redis
    #[instrument(skip(config), level = "info", name = "init_redis_cache_store")]
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        Self::connect_with_provider(config, Arc::new(DefaultRedisProvider)).await
    }

    /// 使用指定的Redis提供者连接
    pub async fn connect_with_provider(
        config: &CacheConfig,
        provider: Arc<dyn RedisProvider>,
    ) -> Result<Self> {
        let (_client, manager) = provider.get_standalone_client(config).await?;
        debug!("Redis cache store connected");
        Ok(Self {
            manager,
            command_timeout_ms: config.command_timeout_ms,
        })
    }

    /// 获取命令超时时间（毫秒）
    pub fn command_timeout_ms(&self) -> u64 {
        self.command_timeout_ms
    }

    async fn run<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SyncError::Timeout(format!(
                "Redis {} timed out after {}ms",
                op, self.command_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        self.run("EXISTS", async move {
            redis::cmd("EXISTS").arg(key).query_async::<bool>(&mut conn).await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        self.run("SET", async move {
            redis::cmd("SET")
                .arg(key)
                .arg(1)
                .arg("EX")
                .arg(ttl_secs(ttl))
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.manager.clone();
        self.run("EXPIRE", async move {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs(ttl))
                .query_async::<bool>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        self.run("DEL", async move {
            redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await
        })
        .await
    }

    #[instrument(skip(self, fields), level = "debug", fields(field_count = fields.len()))]
    async fn hset_all(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        self.run("HSET", async move {
            redis::pipe()
                .atomic()
                .cmd("HSET")
                .arg(key)
                .arg(fields)
                .ignore()
                .cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs(ttl))
                .ignore()
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self, items), level = "debug", fields(item_count = items.len()))]
    async fn pipeline_hset_batch(&self, items: Vec<HashWrite>) -> Result<()> {
        if items.iter().all(|(_, fields, _)| fields.is_empty()) {
            return Ok(());
        }
        debug!("Pipeline hash batch with {} items", items.len());
        let mut pipe = redis::pipe();
        for (key, fields, ttl) in items.iter() {
            if fields.is_empty() {
                continue;
            }
            pipe.cmd("HSET").arg(key).arg(fields).ignore();
            pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(*ttl)).ignore();
        }
        let mut conn = self.manager.clone();
        self.run("PIPELINE_HSET", async move {
            pipe.query_async::<()>(&mut conn).await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        self.run("HGET", async move {
            redis::cmd("HGET")
                .arg(key)
                .arg(field)
                .query_async::<Option<String>>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.manager.clone();
        self.run("HGETALL", async move {
            redis::cmd("HGETALL")
                .arg(key)
                .query_async::<HashMap<String, String>>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self, items), level = "debug", fields(item_count = items.len()))]
    async fn pipeline_hget_all(
        &self,
        items: &[(String, Duration)],
    ) -> Result<Vec<HashMap<String, String>>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for (key, ttl) in items {
            pipe.cmd("HGETALL").arg(key);
            pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(*ttl)).ignore();
        }
        let mut conn = self.manager.clone();
        self.run("PIPELINE_HGETALL", async move {
            pipe.query_async::<Vec<HashMap<String, String>>>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn hset_if_exists(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let script = redis::Script::new(HSET_IF_EXISTS);
        let mut conn = self.manager.clone();
        let written: i32 = self
            .run("HSET_IF_EXISTS", async {
                script
                    .key(key)
                    .arg(field)
                    .arg(value)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(written == 1)
    }

    #[instrument(skip(self), level = "debug")]
    async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        self.run("HDEL", async move {
            redis::cmd("HDEL")
                .arg(key)
                .arg(field)
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self, members), level = "debug", fields(member_count = members.len()))]
    async fn zadd(&self, key: &str, members: &[(f64, String)], ttl: Duration) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        self.run("ZADD", async move {
            redis::pipe()
                .atomic()
                .cmd("ZADD")
                .arg(key)
                .arg(members)
                .ignore()
                .cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs(ttl))
                .ignore()
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn zadd_if_exists(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let script = redis::Script::new(ZADD_IF_EXISTS);
        let mut conn = self.manager.clone();
        let added: i32 = self
            .run("ZADD_IF_EXISTS", async {
                script
                    .key(key)
                    .arg(score)
                    .arg(member)
                    .arg(ttl_secs(ttl))
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(added == 1)
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let removed: i64 = self
            .run("ZREM", async move {
                redis::cmd("ZREM")
                    .arg(key)
                    .arg(member)
                    .query_async::<i64>(&mut conn)
                    .await
            })
            .await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrevrange(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        self.run("ZREVRANGE", async move {
            redis::cmd("ZREVRANGE")
                .arg(key)
                .arg(0)
                .arg(-1)
                .query_async::<Vec<String>>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrevrange_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        self.run("ZREVRANGEBYSCORE", async move {
            redis::cmd("ZREVRANGEBYSCORE")
                .arg(key)
                .arg(max)
                .arg(min)
                .arg("LIMIT")
                .arg(0)
                .arg(limit)
                .query_async::<Vec<String>>(&mut conn)
                .await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.manager.clone();
        self.run("ZCARD", async move {
            redis::cmd("ZCARD").arg(key).query_async::<u64>(&mut conn).await
        })
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let response: String = self
            .run("PING", async move {
                redis::cmd("PING").query_async::<String>(&mut conn).await
            })
            .await?;
        debug!("Redis ping response: {}", response);
        Ok(())
    }
}
