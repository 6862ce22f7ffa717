//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了视频评论列表的读取。

use super::user::UserService;
use crate::cache::{EntityCache, IndexCache, Window};
use crate::error::{Result, SyncError};
use crate::keys::IndexScope;
use crate::model::{Comment, UserProfile, Video};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

/// 面向调用方的评论信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub comment_id: u64,
    pub video_id: u64,
    /// 评论作者
    pub user: UserProfile,
    pub content: String,
    /// 展示用日期，如 `2025-03-01 08:30`
    pub create_date: String,
}

#[derive(Clone)]
pub struct CommentService {
    index: IndexCache<Comment>,
    videos: EntityCache<Video>,
    users: UserService,
}

impl CommentService {
    pub fn new(index: IndexCache<Comment>, videos: EntityCache<Video>, users: UserService) -> Self {
        Self {
            index,
            videos,
            users,
        }
    }

    /// 某视频下的全部评论，从新到旧，作者按评论的 `user_id` 解析
    #[instrument(skip(self), level = "debug")]
    pub async fn comments(&self, video_id: u64, viewer: Option<u64>) -> Result<Vec<CommentView>> {
        if self.videos.get_batch(&[video_id]).await?.is_empty() {
            return Err(SyncError::NotFound(format!("video {}", video_id)));
        }
        let comments = self
            .index
            .read(IndexScope::VideoComments(video_id), Window::All)
            .await?;
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let author_ids: Vec<u64> = comments
            .iter()
            .map(|c| c.user_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let authors: HashMap<u64, UserProfile> = self
            .users
            .profiles(&author_ids, viewer)
            .await?
            .into_iter()
            .map(|profile| (profile.user_id, profile))
            .collect();

        comments
            .into_iter()
            .map(|comment| {
                let user = authors
                    .get(&comment.user_id)
                    .cloned()
                    .ok_or_else(|| SyncError::NotFound(format!("user {}", comment.user_id)))?;
                Ok(CommentView {
                    comment_id: comment.comment_id,
                    video_id: comment.video_id,
                    user,
                    create_date: comment.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    content: comment.content,
                })
            })
            .collect()
    }
}
