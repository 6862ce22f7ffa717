//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 关系型存储模块
//!
//! 关系型存储是唯一的事实来源。缓存层只通过 [`RecordStore`] 读取数据，
//! 通过 [`RecordTx`] 在单次写操作的事务内修改数据。

use crate::error::Result;
use crate::model::{Comment, FollowEdge, User, UserStats, Video};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

pub mod connection_string;
pub mod schema;
pub mod sea_orm_store;

pub use connection_string::{
    ensure_database_directory, extract_sqlite_path, is_memory_sqlite,
    normalize_connection_string, DbType,
};
pub use sea_orm_store::SeaOrmRecordStore;

/// 关系型存储的读取接口
///
/// 批量查询不保证返回顺序，也不保证每个请求的ID都有对应结果；
/// 排序和补齐由调用方负责。
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 按ID批量查询视频
    async fn videos_by_ids(&self, ids: &[u64]) -> Result<Vec<Video>>;

    /// 查询某用户发布的全部视频，按创建时间从新到旧
    async fn videos_by_author(&self, author_id: u64) -> Result<Vec<Video>>;

    /// 查询全部视频，按创建时间从新到旧
    async fn all_videos(&self) -> Result<Vec<Video>>;

    /// 写入视频（自动提交）
    async fn insert_video(&self, video: &Video) -> Result<()>;

    /// 按ID批量查询评论
    async fn comments_by_ids(&self, ids: &[u64]) -> Result<Vec<Comment>>;

    /// 查询某视频下的全部评论，按创建时间从新到旧
    async fn comments_by_video(&self, video_id: u64) -> Result<Vec<Comment>>;

    /// 分组统计评论数，没有评论的视频不出现在结果中
    async fn comment_counts(&self, video_ids: &[u64]) -> Result<HashMap<u64, i64>>;

    /// 分组统计点赞数，没有点赞的视频不出现在结果中
    async fn favorite_counts(&self, video_ids: &[u64]) -> Result<HashMap<u64, i64>>;

    /// 返回 `video_ids` 中被该用户点赞的视频
    async fn favorited_videos(&self, user_id: u64, video_ids: &[u64]) -> Result<HashSet<u64>>;

    /// 按ID批量查询用户
    async fn users_by_ids(&self, ids: &[u64]) -> Result<Vec<User>>;

    /// 写入用户（自动提交）
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// 查询时计算用户的各项计数，所有请求的ID都会出现在结果中
    async fn user_stats(&self, user_ids: &[u64]) -> Result<HashMap<u64, UserStats>>;

    /// 返回 `user_ids` 中被 `from_user_id` 关注的用户
    async fn followed_among(&self, from_user_id: u64, user_ids: &[u64]) -> Result<HashSet<u64>>;

    /// 开启事务
    async fn begin(&self) -> Result<Box<dyn RecordTx>>;

    /// 检查连接是否正常
    async fn ping(&self) -> Result<()>;
}

/// 单次写操作的事务
///
/// 事务内只执行写语句；提交或回滚后事务被消耗。
/// 未提交即被丢弃的事务会被回滚。
#[async_trait]
pub trait RecordTx: Send {
    async fn insert_comment(&mut self, comment: &Comment) -> Result<()>;

    /// 按 (评论ID, 用户ID, 视频ID) 联合条件删除，返回受影响行数
    async fn delete_comment(&mut self, comment_id: u64, user_id: u64, video_id: u64)
        -> Result<u64>;

    /// 写入点赞关系，已存在时返回 false
    async fn insert_favorite(&mut self, user_id: u64, video_id: u64) -> Result<bool>;

    /// 删除点赞关系，不存在时返回 false
    async fn delete_favorite(&mut self, user_id: u64, video_id: u64) -> Result<bool>;

    /// 写入关注关系，已存在时返回 false
    async fn insert_follow(&mut self, edge: &FollowEdge) -> Result<bool>;

    /// 删除关注关系，不存在时返回 false
    async fn delete_follow(&mut self, from_user_id: u64, to_user_id: u64) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
