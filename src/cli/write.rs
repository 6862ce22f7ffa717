//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写入命令，全部经由写操作协调器执行。

use crate::cli::{print_json, PublishArgs};
use crate::manager::FeedSyncManager;
use anyhow::{bail, Result};
use serde_json::json;

pub async fn create_user(manager: &FeedSyncManager, name: &str) -> Result<()> {
    let user = manager.users().create_user(name).await?;
    print_json(&user)
}

pub async fn publish(manager: &FeedSyncManager, args: &PublishArgs) -> Result<()> {
    let video = manager
        .coordinator()
        .publish_video(args.user, &args.title, &args.play_url, &args.cover_url)
        .await?;
    print_json(&video)
}

pub async fn add_comment(
    manager: &FeedSyncManager,
    video_id: u64,
    user_id: u64,
    text: &str,
) -> Result<()> {
    let comment = manager
        .coordinator()
        .add_comment(video_id, user_id, text)
        .await?;
    print_json(&comment)
}

pub async fn delete_comment(
    manager: &FeedSyncManager,
    user_id: u64,
    video_id: u64,
    comment_id: u64,
) -> Result<()> {
    if comment_id == 0 {
        bail!("Comment id must be positive");
    }
    manager
        .coordinator()
        .delete_comment(user_id, video_id, comment_id)
        .await?;
    print_json(&json!({ "deleted": comment_id }))
}
