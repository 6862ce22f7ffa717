//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 评论实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: u64,
    pub video_id: u64,
    /// 评论作者
    pub user_id: u64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
