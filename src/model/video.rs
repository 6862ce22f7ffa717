//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 视频实体
///
/// `favorite_count` 与 `comment_count` 为派生字段，由计数聚合器填充
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: u64,
    pub author_id: u64,
    pub title: String,
    pub play_url: String,
    pub cover_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(default)]
    pub comment_count: i64,
}

impl Video {
    pub fn new(
        video_id: u64,
        author_id: u64,
        title: impl Into<String>,
        play_url: impl Into<String>,
        cover_url: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            video_id,
            author_id,
            title: title.into(),
            play_url: play_url.into(),
            cover_url: cover_url.into(),
            created_at,
            favorite_count: 0,
            comment_count: 0,
        }
    }
}
