//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了短视频业务的实体模型。
//!
//! 计数类字段（点赞数、评论数、关注数等）均在查询时由聚合查询或缓存计数得出，
//! 不作为数据库列存储。

mod comment;
mod user;
mod video;

pub use comment::Comment;
pub use user::{FollowEdge, User, UserProfile, UserStats};
pub use video::Video;

use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};

/// 当前时间，截断到毫秒精度
///
/// 数据库与缓存都以毫秒时间戳保存创建时间，截断后写入与读回的值完全一致
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// 毫秒时间戳转换为UTC时间
pub fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| SyncError::Serialization(format!("timestamp out of range: {}", millis)))
}

/// 有序集合的分值：创建时间（秒，保留毫秒精度）
pub fn time_score(created_at: &DateTime<Utc>) -> f64 {
    created_at.timestamp_millis() as f64 / 1000.0
}
