//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存同步层的配置结构和解析逻辑。

use crate::error::{Result, SyncError};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

/// 顶层配置
///
/// 所有字段都有默认值，空的TOML文档即为可用的本地开发配置
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub config_version: Option<u32>,
    /// 缓存存储配置
    pub cache: CacheConfig,
    /// 关系型存储配置
    pub database: DatabaseConfig,
    /// 各类缓存键的过期时间
    pub ttl: TtlConfig,
    /// 输入与分页限制
    pub limits: LimitsConfig,
}

/// 缓存后端类型
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    /// Redis 单机
    #[default]
    Redis,
    /// 进程内存（单进程部署和测试）
    Memory,
}

/// 缓存存储配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 单条命令超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 键命名空间前缀
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendType::Redis,
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            enable_tls: false,
            key_prefix: "feedsync".to_string(),
        }
    }
}

/// 关系型存储配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库连接串（sqlite / postgres / mysql）
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
    /// 连接超时时间（毫秒）
    pub connect_timeout_ms: u64,
    /// 单条查询超时时间（毫秒）
    pub query_timeout_ms: u64,
    /// 是否输出 sqlx 语句日志
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: SecretString::new("sqlite::memory:".to_string().into()),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_ms: 10_000,
            query_timeout_ms: 5000,
            sqlx_logging: false,
        }
    }
}

/// 过期时间配置（秒）
///
/// 实际写入的TTL为对应类别的基础值加上 `[0, jitter_secs]` 内的随机抖动
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct TtlConfig {
    pub video_secs: u64,
    pub comment_secs: u64,
    pub video_comments_secs: u64,
    pub publish_secs: u64,
    pub feed_secs: u64,
    pub empty_secs: u64,
    pub jitter_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            video_secs: 600,
            comment_secs: 600,
            video_comments_secs: 600,
            publish_secs: 600,
            feed_secs: 600,
            empty_secs: 600,
            jitter_secs: 600,
        }
    }
}

/// 输入与分页限制
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LimitsConfig {
    /// 每次推送返回的最大视频数
    pub feed_page_size: usize,
    /// 评论最大长度（字符）
    pub max_comment_length: usize,
    /// 视频标题最大长度（字符）
    pub max_title_length: usize,
    /// 播放地址与封面地址最大长度（字符）
    pub max_url_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            feed_page_size: 30,
            max_comment_length: 300,
            max_title_length: 140,
            max_url_length: 2048,
        }
    }
}

impl Config {
    /// 从TOML字符串解析配置并校验
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| SyncError::Configuration(format!("Invalid TOML: {}", e)))?;
        config.validate().map_err(SyncError::Configuration)?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 校验配置
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        let ttl = &self.ttl;
        for (name, value) in [
            ("video_secs", ttl.video_secs),
            ("comment_secs", ttl.comment_secs),
            ("video_comments_secs", ttl.video_comments_secs),
            ("publish_secs", ttl.publish_secs),
            ("feed_secs", ttl.feed_secs),
            ("empty_secs", ttl.empty_secs),
        ] {
            if value == 0 {
                return Err(format!("ttl.{} cannot be zero", name));
            }
            if value > 86400 * 30 {
                return Err(format!("ttl.{} cannot exceed 30 days", name));
            }
        }
        if ttl.jitter_secs > 86400 {
            return Err("ttl.jitter_secs cannot exceed one day".to_string());
        }

        if self.cache.command_timeout_ms == 0 || self.database.query_timeout_ms == 0 {
            return Err("Store timeouts cannot be zero".to_string());
        }
        if self.cache.key_prefix.is_empty() || self.cache.key_prefix.contains(char::is_whitespace)
        {
            return Err("cache.key_prefix must be a non-empty token".to_string());
        }
        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err("database connection pool bounds are invalid".to_string());
        }

        let limits = &self.limits;
        if limits.feed_page_size == 0 || limits.feed_page_size > 1000 {
            return Err("limits.feed_page_size must be between 1 and 1000".to_string());
        }
        if limits.max_comment_length == 0
            || limits.max_title_length == 0
            || limits.max_url_length == 0
        {
            return Err("Text length limits cannot be zero".to_string());
        }
        Ok(())
    }
}
