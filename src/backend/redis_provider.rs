//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了Redis连接提供者接口和默认实现。

use crate::{
    config::CacheConfig,
    error::{Result, SyncError},
};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use secrecy::ExposeSecret;
use tokio::time::{timeout, Duration};

#[async_trait]
pub trait RedisProvider: Send + Sync {
    async fn get_standalone_client(&self, config: &CacheConfig)
        -> Result<(Client, ConnectionManager)>;
}

pub struct DefaultRedisProvider;

/// 启用 TLS 时将 `redis://` 改写为 `rediss://`
pub(crate) fn effective_connection_string(config: &CacheConfig) -> String {
    let raw = config.connection_string.expose_secret();
    if config.enable_tls && !raw.starts_with("rediss://") {
        raw.replace("redis://", "rediss://")
    } else {
        raw.to_string()
    }
}

#[async_trait]
impl RedisProvider for DefaultRedisProvider {
    async fn get_standalone_client(
        &self,
        config: &CacheConfig,
    ) -> Result<(Client, ConnectionManager)> {
        let connection_string = effective_connection_string(config);
        let client = Client::open(connection_string.as_str())?;
        let manager = match timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(SyncError::Timeout(format!(
                    "Redis connection timed out after {}ms",
                    config.connection_timeout_ms
                )));
            }
        };
        Ok((client, manager))
    }
}
