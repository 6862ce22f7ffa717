//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存键的命名规则和过期时间分类。
//!
//! 键布局（`p` 为命名空间前缀）：
//!
//! | 用途 | 键 |
//! |------|----|
//! | 视频快照 | `p:video:{video_id}` |
//! | 评论快照 | `p:comment:{comment_id}` |
//! | 全局推送索引 | `p:feed` |
//! | 用户发布索引 | `p:publish:{user_id}` |
//! | 视频评论索引 | `p:video_comments:{video_id}` |
//! | 空集合标记 | `p:empty:{索引键去掉前缀}` |
//!
//! 空集合标记与索引键属于不同的键族：索引键不存在表示"未知，需要查库"，
//! 空集合标记存在表示"数据库已确认为空，跳过查库"。

use crate::config::{Config, TtlConfig};
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// 实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Video,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Video => "video",
            EntityKind::Comment => "comment",
        }
    }
}

/// 过期时间类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Video,
    Comment,
    VideoComments,
    Publish,
    Feed,
    Empty,
}

/// 索引作用域
///
/// 每个作用域对应一个有序集合，成员为实体ID，分值为创建时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexScope {
    /// 全局推送流
    GlobalFeed,
    /// 某用户发布的视频
    UserPublish(u64),
    /// 某视频下的评论
    VideoComments(u64),
}

impl IndexScope {
    pub fn ttl_class(&self) -> TtlClass {
        match self {
            IndexScope::GlobalFeed => TtlClass::Feed,
            IndexScope::UserPublish(_) => TtlClass::Publish,
            IndexScope::VideoComments(_) => TtlClass::VideoComments,
        }
    }

    /// 索引类别名，用于日志和指标
    pub fn label(&self) -> &'static str {
        match self {
            IndexScope::GlobalFeed => "feed",
            IndexScope::UserPublish(_) => "publish",
            IndexScope::VideoComments(_) => "video_comments",
        }
    }
}

impl fmt::Display for IndexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexScope::GlobalFeed => write!(f, "feed"),
            IndexScope::UserPublish(user_id) => write!(f, "publish:{}", user_id),
            IndexScope::VideoComments(video_id) => write!(f, "video_comments:{}", video_id),
        }
    }
}

/// 缓存键方案
#[derive(Debug, Clone)]
pub struct KeyScheme {
    prefix: String,
    ttl: TtlConfig,
}

impl KeyScheme {
    pub fn new(prefix: impl Into<String>, ttl: TtlConfig) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache.key_prefix.clone(), config.ttl.clone())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 实体快照键
    pub fn entity(&self, kind: EntityKind, id: u64) -> String {
        format!("{}:{}:{}", self.prefix, kind.as_str(), id)
    }

    /// 索引键
    pub fn index(&self, scope: IndexScope) -> String {
        format!("{}:{}", self.prefix, scope)
    }

    /// 空集合标记键
    pub fn empty(&self, scope: IndexScope) -> String {
        format!("{}:empty:{}", self.prefix, scope)
    }

    /// 不含抖动的基础过期时间
    pub fn base_ttl(&self, class: TtlClass) -> Duration {
        let secs = match class {
            TtlClass::Video => self.ttl.video_secs,
            TtlClass::Comment => self.ttl.comment_secs,
            TtlClass::VideoComments => self.ttl.video_comments_secs,
            TtlClass::Publish => self.ttl.publish_secs,
            TtlClass::Feed => self.ttl.feed_secs,
            TtlClass::Empty => self.ttl.empty_secs,
        };
        Duration::from_secs(secs)
    }

    /// 写入时使用的过期时间：基础值加随机抖动，避免同批写入的键同时过期
    pub fn ttl(&self, class: TtlClass) -> Duration {
        let jitter = if self.ttl.jitter_secs > 0 {
            rand::thread_rng().gen_range(0..=self.ttl.jitter_secs)
        } else {
            0
        };
        self.base_ttl(class) + Duration::from_secs(jitter)
    }
}
