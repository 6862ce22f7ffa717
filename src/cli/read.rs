//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了只读查询命令。

use crate::cache::CountKind;
use crate::cli::{print_json, CountArg, CountsArgs, FeedArgs, VideosArgs};
use crate::manager::FeedSyncManager;
use anyhow::Result;
use serde_json::{Map, Value};

pub async fn profile(manager: &FeedSyncManager, user_id: u64, viewer: Option<u64>) -> Result<()> {
    let profile = manager.users().profile(user_id, viewer).await?;
    print_json(&profile)
}

pub async fn feed(manager: &FeedSyncManager, args: &FeedArgs) -> Result<()> {
    let page = manager.videos().feed(args.latest_time, args.viewer).await?;
    print_json(&page)
}

pub async fn videos(manager: &FeedSyncManager, args: &VideosArgs) -> Result<()> {
    let videos = manager
        .videos()
        .published_videos(args.user_id, args.viewer)
        .await?;
    print_json(&videos)
}

pub async fn comments(manager: &FeedSyncManager, video_id: u64, viewer: Option<u64>) -> Result<()> {
    let comments = manager.comments().comments(video_id, viewer).await?;
    print_json(&comments)
}

pub async fn counts(manager: &FeedSyncManager, args: &CountsArgs) -> Result<()> {
    let kind = match args.kind {
        CountArg::Comment => CountKind::Comment,
        CountArg::Favorite => CountKind::Favorite,
    };
    let counts = manager.counts().get_counts(kind, &args.video_ids).await?;
    let rows: Vec<_> = args
        .video_ids
        .iter()
        .zip(counts)
        .map(|(video_id, count)| {
            let mut row = Map::new();
            row.insert("video_id".to_string(), Value::from(*video_id));
            row.insert(kind.field().to_string(), Value::from(count));
            Value::Object(row)
        })
        .collect();
    print_json(&rows)
}
