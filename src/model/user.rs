//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户记录（凭据不在本层处理）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// 查询时计算的用户计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// 关注的人数
    pub follow_count: i64,
    /// 粉丝数
    pub follower_count: i64,
    /// 作品获赞总数
    pub total_favorited: i64,
    /// 作品数
    pub work_count: i64,
    /// 点赞的视频数
    pub favorite_count: i64,
}

/// 面向调用方的用户信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: u64,
    pub name: String,
    #[serde(flatten)]
    pub stats: UserStats,
    /// 当前查看者是否关注了该用户
    pub is_follow: bool,
}

/// 关注关系（有向边）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follow_id: u64,
    pub from_user_id: u64,
    pub to_user_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
