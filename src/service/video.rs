//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了推送流与发布列表的读取。

use super::user::UserService;
use crate::cache::{CountAggregator, CountKind, IndexCache, Window};
use crate::database::RecordStore;
use crate::error::{Result, SyncError};
use crate::keys::IndexScope;
use crate::model::{now_millis, UserProfile, Video};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 面向调用方的视频信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoView {
    #[serde(flatten)]
    pub video: Video,
    pub author: UserProfile,
    /// 当前查看者是否点赞
    pub is_favorite: bool,
}

/// 推送流的一页
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub videos: Vec<VideoView>,
    /// 下一页请求应携带的时间（毫秒），为本页最早的创建时间
    pub next_time: i64,
}

#[derive(Clone)]
pub struct VideoService {
    index: IndexCache<Video>,
    counts: CountAggregator,
    users: UserService,
    records: Arc<dyn RecordStore>,
    page_size: usize,
}

impl VideoService {
    pub fn new(
        index: IndexCache<Video>,
        counts: CountAggregator,
        users: UserService,
        records: Arc<dyn RecordStore>,
        page_size: usize,
    ) -> Self {
        Self {
            index,
            counts,
            users,
            records,
            page_size,
        }
    }

    /// 读取推送流
    ///
    /// `latest_time` 为空或非正数时从当前时间开始。
    /// 窗口截止于 `latest_time - 2` 毫秒，把上一页的 `next_time` 传回时，
    /// 创建时间比它早不足2毫秒的视频不会返回
    #[instrument(skip(self), level = "debug")]
    pub async fn feed(&self, latest_time: Option<i64>, viewer: Option<u64>) -> Result<FeedPage> {
        let latest_time = latest_time
            .filter(|t| *t > 0)
            .unwrap_or_else(|| now_millis().timestamp_millis());
        let videos = self
            .index
            .read(IndexScope::GlobalFeed, Window::feed(latest_time, self.page_size))
            .await?;
        let next_time = videos
            .last()
            .map(|v| v.created_at.timestamp_millis())
            .unwrap_or(latest_time);
        debug!("Feed page with {} videos, next_time {}", videos.len(), next_time);
        Ok(FeedPage {
            videos: self.hydrate(videos, viewer).await?,
            next_time,
        })
    }

    /// 某用户发布的全部视频，从新到旧
    #[instrument(skip(self), level = "debug")]
    pub async fn published_videos(&self, user_id: u64, viewer: Option<u64>) -> Result<Vec<VideoView>> {
        // 确认用户存在
        self.users.profile(user_id, viewer).await?;
        let videos = self
            .index
            .read(IndexScope::UserPublish(user_id), Window::All)
            .await?;
        self.hydrate(videos, viewer).await
    }

    /// 为视频补充计数、作者信息和点赞状态
    pub async fn hydrate(&self, videos: Vec<Video>, viewer: Option<u64>) -> Result<Vec<VideoView>> {
        if videos.is_empty() {
            return Ok(Vec::new());
        }
        let video_ids: Vec<u64> = videos.iter().map(|v| v.video_id).collect();
        let (comment_counts, favorite_counts) = futures::try_join!(
            self.counts.get_counts(CountKind::Comment, &video_ids),
            self.counts.get_counts(CountKind::Favorite, &video_ids),
        )?;

        let mut seen = HashSet::new();
        let author_ids: Vec<u64> = videos
            .iter()
            .map(|v| v.author_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let authors: HashMap<u64, UserProfile> = self
            .users
            .profiles(&author_ids, viewer)
            .await?
            .into_iter()
            .map(|profile| (profile.user_id, profile))
            .collect();

        let favorited = match viewer {
            Some(viewer_id) => self.records.favorited_videos(viewer_id, &video_ids).await?,
            None => HashSet::new(),
        };

        let mut views = Vec::with_capacity(videos.len());
        for ((mut video, comment_count), favorite_count) in videos
            .into_iter()
            .zip(comment_counts)
            .zip(favorite_counts)
        {
            let author = authors
                .get(&video.author_id)
                .cloned()
                .ok_or_else(|| SyncError::NotFound(format!("author {}", video.author_id)))?;
            video.comment_count = comment_count;
            video.favorite_count = favorite_count;
            views.push(VideoView {
                is_favorite: favorited.contains(&video.video_id),
                video,
                author,
            });
        }
        Ok(views)
    }
}
