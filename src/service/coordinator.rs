//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了跨关系型存储与缓存的写操作协调。
//!
//! 事务内只执行写语句，前置的存在性检查在事务开始前完成，
//! 使单连接的连接池在事务期间不会被再次占用。

use crate::backend::CacheStore;
use crate::cache::{CountAggregator, CountKind, IndexCache};
use crate::config::LimitsConfig;
use crate::database::{RecordStore, RecordTx};
use crate::error::{Result, SyncError};
use crate::id::IdGenerator;
use crate::keys::{IndexScope, KeyScheme};
use crate::metrics::Metrics;
use crate::model::{now_millis, Comment, FollowEdge, Video};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const COMPONENT: &str = "coordinator";

fn validate_text(value: &str, max_chars: usize, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::Validation(format!("{} cannot be empty", what)));
    }
    let length = value.chars().count();
    if length > max_chars {
        return Err(SyncError::Validation(format!(
            "{} is {} characters, limit is {}",
            what, length, max_chars
        )));
    }
    Ok(())
}

/// 写操作协调器
///
/// 关系型写入在事务内完成，随后执行缓存写入；缓存写入失败时回滚事务
/// 并返回 [`SyncError::ConsistencyAbort`]
#[derive(Clone)]
pub struct ConsistencyCoordinator {
    records: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
    videos: IndexCache<Video>,
    comments: IndexCache<Comment>,
    counts: CountAggregator,
    limits: LimitsConfig,
    metrics: Arc<Metrics>,
}

impl ConsistencyCoordinator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        records: Arc<dyn RecordStore>,
        ids: Arc<dyn IdGenerator>,
        keys: KeyScheme,
        limits: LimitsConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            videos: IndexCache::new(cache.clone(), records.clone(), keys.clone(), metrics.clone()),
            comments: IndexCache::new(cache.clone(), records.clone(), keys.clone(), metrics.clone()),
            counts: CountAggregator::new(cache, records.clone(), keys, metrics.clone()),
            records,
            ids,
            limits,
            metrics,
        }
    }

    /// 回滚事务并把缓存失败包装为一致性中止
    async fn abort(&self, op: &str, tx: Box<dyn RecordTx>, cause: SyncError) -> SyncError {
        self.metrics.record(COMPONENT, op, "abort");
        warn!("{} cache step failed, rolling back: {}", op, cause);
        if let Err(e) = tx.rollback().await {
            warn!("Rollback after failed {} also failed: {}", op, e);
        }
        SyncError::ConsistencyAbort(format!("{}: {}", op, cause))
    }

    /// 回滚事务并原样返回错误
    async fn discard(&self, op: &str, tx: Box<dyn RecordTx>, cause: SyncError) -> SyncError {
        self.metrics.record(COMPONENT, op, "error");
        if let Err(e) = tx.rollback().await {
            warn!("Rollback after failed {} also failed: {}", op, e);
        }
        cause
    }

    async fn require_video(&self, video_id: u64) -> Result<()> {
        if self.videos.entities().get_batch(&[video_id]).await?.is_empty() {
            return Err(SyncError::NotFound(format!("video {}", video_id)));
        }
        Ok(())
    }

    /// 发表评论
    #[instrument(skip(self, content), level = "info")]
    pub async fn add_comment(&self, video_id: u64, user_id: u64, content: &str) -> Result<Comment> {
        validate_text(content, self.limits.max_comment_length, "comment")?;
        self.require_video(video_id).await?;

        let comment = Comment {
            comment_id: self.ids.next_id()?,
            video_id,
            user_id,
            content: content.to_string(),
            created_at: now_millis(),
        };

        let mut tx = self.records.begin().await?;
        if let Err(e) = tx.insert_comment(&comment).await {
            return Err(self.discard("add_comment", tx, e).await);
        }
        if let Err(e) = self.cache_comment_added(&comment).await {
            let err = self.abort("add_comment", tx, e).await;
            // 前面的缓存写入可能已经成功
            self.forget_comment(&comment).await;
            return Err(err);
        }
        if let Err(e) = tx.commit().await {
            self.metrics.record(COMPONENT, "add_comment", "error");
            self.forget_comment(&comment).await;
            return Err(e);
        }

        self.metrics.record(COMPONENT, "add_comment", "ok");
        info!("Comment {} added to video {}", comment.comment_id, video_id);
        Ok(comment)
    }

    async fn cache_comment_added(&self, comment: &Comment) -> Result<()> {
        let scope = IndexScope::VideoComments(comment.video_id);
        self.comments.entities().put(comment).await?;
        let appended = self.comments.append(scope, comment).await?;
        debug!("Comment index {} appended: {}", scope, appended);
        self.counts
            .invalidate(CountKind::Comment, comment.video_id)
            .await
    }

    /// 缓存步骤中止或提交失败后撤销已写入的缓存
    async fn forget_comment(&self, comment: &Comment) {
        let scope = IndexScope::VideoComments(comment.video_id);
        if let Err(e) = self.comments.remove(scope, comment.comment_id).await {
            warn!("Failed to remove comment {} from {}: {}", comment.comment_id, scope, e);
        }
        if let Err(e) = self.comments.entities().invalidate(comment.comment_id).await {
            warn!("Failed to drop snapshot of comment {}: {}", comment.comment_id, e);
        }
    }

    /// 评论仍在库中但可能已从索引移除，整个索引下次读取时重建
    async fn drop_comment_index(&self, scope: IndexScope) {
        if let Err(e) = self.comments.invalidate(scope).await {
            warn!("Failed to drop comment index {}: {}", scope, e);
        }
    }

    /// 删除评论
    ///
    /// 只有评论作者能在评论所属视频下删除；条件不匹配时返回 `Authorization`
    #[instrument(skip(self), level = "info")]
    pub async fn delete_comment(&self, user_id: u64, video_id: u64, comment_id: u64) -> Result<()> {
        let mut tx = self.records.begin().await?;
        let affected = match tx.delete_comment(comment_id, user_id, video_id).await {
            Ok(affected) => affected,
            Err(e) => return Err(self.discard("delete_comment", tx, e).await),
        };
        if affected == 0 {
            let err = SyncError::Authorization(format!(
                "user {} cannot delete comment {} on video {}",
                user_id, comment_id, video_id
            ));
            return Err(self.discard("delete_comment", tx, err).await);
        }

        let scope = IndexScope::VideoComments(video_id);
        let cache_step = async {
            self.comments.remove(scope, comment_id).await?;
            self.comments.entities().invalidate(comment_id).await?;
            self.counts.invalidate(CountKind::Comment, video_id).await
        };
        if let Err(e) = cache_step.await {
            let err = self.abort("delete_comment", tx, e).await;
            self.drop_comment_index(scope).await;
            return Err(err);
        }
        if let Err(e) = tx.commit().await {
            self.metrics.record(COMPONENT, "delete_comment", "error");
            self.drop_comment_index(scope).await;
            return Err(e);
        }

        self.metrics.record(COMPONENT, "delete_comment", "ok");
        info!("Comment {} deleted from video {}", comment_id, video_id);
        Ok(())
    }

    /// 发布视频
    ///
    /// 数据库写入先行提交；随后的缓存写入失败时返回 `ConsistencyAbort`，
    /// 已提交的行保留
    #[instrument(skip(self, play_url, cover_url), level = "info")]
    pub async fn publish_video(
        &self,
        user_id: u64,
        title: &str,
        play_url: &str,
        cover_url: &str,
    ) -> Result<Video> {
        validate_text(title, self.limits.max_title_length, "title")?;
        validate_text(play_url, self.limits.max_url_length, "play_url")?;
        validate_text(cover_url, self.limits.max_url_length, "cover_url")?;

        let video = Video::new(
            self.ids.next_id()?,
            user_id,
            title,
            play_url,
            cover_url,
            now_millis(),
        );
        self.records.insert_video(&video).await?;

        if let Err(e) = self.cache_video_published(&video).await {
            self.metrics.record(COMPONENT, "publish_video", "abort");
            warn!("Video {} stored but not cached: {}", video.video_id, e);
            return Err(SyncError::ConsistencyAbort(format!(
                "publish_video {}: {}",
                video.video_id, e
            )));
        }

        self.metrics.record(COMPONENT, "publish_video", "ok");
        info!("Video {} published by user {}", video.video_id, user_id);
        Ok(video)
    }

    async fn cache_video_published(&self, video: &Video) -> Result<()> {
        let publish = IndexScope::UserPublish(video.author_id);
        self.videos.entities().put(video).await?;
        if !self.videos.append(publish, video).await? {
            let all = self.records.videos_by_author(video.author_id).await?;
            self.videos.populate(publish, &all).await?;
            let ids: Vec<u64> = all.iter().map(|v| v.video_id).collect();
            self.counts.get_counts(CountKind::Comment, &ids).await?;
            self.counts.get_counts(CountKind::Favorite, &ids).await?;
            info!("Publish index {} started with {} videos", publish, all.len());
        }
        self.videos.append(IndexScope::GlobalFeed, video).await?;
        Ok(())
    }

    /// 点赞，已点赞时返回 false
    #[instrument(skip(self), level = "info")]
    pub async fn favorite(&self, user_id: u64, video_id: u64) -> Result<bool> {
        self.require_video(video_id).await?;
        let mut tx = self.records.begin().await?;
        let changed = match tx.insert_favorite(user_id, video_id).await {
            Ok(changed) => changed,
            Err(e) => return Err(self.discard("favorite", tx, e).await),
        };
        self.finish_favorite("favorite", tx, video_id, changed).await
    }

    /// 取消点赞，未点赞时返回 false
    #[instrument(skip(self), level = "info")]
    pub async fn unfavorite(&self, user_id: u64, video_id: u64) -> Result<bool> {
        let mut tx = self.records.begin().await?;
        let changed = match tx.delete_favorite(user_id, video_id).await {
            Ok(changed) => changed,
            Err(e) => return Err(self.discard("unfavorite", tx, e).await),
        };
        self.finish_favorite("unfavorite", tx, video_id, changed).await
    }

    async fn finish_favorite(
        &self,
        op: &str,
        tx: Box<dyn RecordTx>,
        video_id: u64,
        changed: bool,
    ) -> Result<bool> {
        if changed {
            if let Err(e) = self.counts.invalidate(CountKind::Favorite, video_id).await {
                return Err(self.abort(op, tx, e).await);
            }
        }
        tx.commit().await?;
        self.metrics.record(COMPONENT, op, "ok");
        Ok(changed)
    }

    /// 关注，已关注时返回 false
    #[instrument(skip(self), level = "info")]
    pub async fn follow(&self, from_user_id: u64, to_user_id: u64) -> Result<bool> {
        if from_user_id == to_user_id {
            return Err(SyncError::Validation("users cannot follow themselves".to_string()));
        }
        let known = self.records.users_by_ids(&[from_user_id, to_user_id]).await?;
        for user_id in [from_user_id, to_user_id] {
            if !known.iter().any(|u| u.user_id == user_id) {
                return Err(SyncError::NotFound(format!("user {}", user_id)));
            }
        }

        let now = now_millis();
        let edge = FollowEdge {
            follow_id: self.ids.next_id()?,
            from_user_id,
            to_user_id,
            created_at: now,
            updated_at: now,
        };
        let mut tx = self.records.begin().await?;
        let changed = match tx.insert_follow(&edge).await {
            Ok(changed) => changed,
            Err(e) => return Err(self.discard("follow", tx, e).await),
        };
        tx.commit().await?;
        self.metrics.record(COMPONENT, "follow", "ok");
        Ok(changed)
    }

    /// 取消关注，未关注时返回 false
    #[instrument(skip(self), level = "info")]
    pub async fn unfollow(&self, from_user_id: u64, to_user_id: u64) -> Result<bool> {
        let mut tx = self.records.begin().await?;
        let changed = match tx.delete_follow(from_user_id, to_user_id).await {
            Ok(changed) => changed,
            Err(e) => return Err(self.discard("unfollow", tx, e).await),
        };
        tx.commit().await?;
        self.metrics.record(COMPONENT, "unfollow", "ok");
        Ok(changed)
    }
}
