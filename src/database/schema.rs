//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了关系型存储的表结构。
//!
//! 表结构使用 sea_query 构建，生成的语句对 SQLite、PostgreSQL、MySQL 通用。
//! 时间字段均为毫秒时间戳（BIGINT），计数类字段不落库。

use sea_orm::sea_query::{
    Alias, ColumnDef, Index, IndexCreateStatement, Table, TableCreateStatement,
};

pub const VIDEOS: &str = "videos";
pub const COMMENTS: &str = "comments";
pub const USERS: &str = "users";
pub const FAVORITES: &str = "favorites";
pub const FOLLOWS: &str = "follows";

/// 表名或列名
pub fn ident(name: &str) -> Alias {
    Alias::new(name)
}

fn id_column(name: &str) -> ColumnDef {
    let mut column = ColumnDef::new(ident(name));
    column.big_integer().not_null();
    column
}

fn primary_id() -> ColumnDef {
    let mut column = id_column("id");
    column.primary_key();
    column
}

fn text_column(name: &str, len: u32) -> ColumnDef {
    let mut column = ColumnDef::new(ident(name));
    column.string_len(len).not_null();
    column
}

/// 建表语句，按依赖顺序排列
pub fn create_tables() -> Vec<TableCreateStatement> {
    vec![
        Table::create()
            .table(ident(USERS))
            .if_not_exists()
            .col(&mut primary_id())
            .col(&mut text_column("name", 64))
            .col(&mut id_column("created_at"))
            .to_owned(),
        Table::create()
            .table(ident(VIDEOS))
            .if_not_exists()
            .col(&mut primary_id())
            .col(&mut id_column("author_id"))
            .col(&mut text_column("title", 512))
            .col(&mut text_column("play_url", 2048))
            .col(&mut text_column("cover_url", 2048))
            .col(&mut id_column("created_at"))
            .to_owned(),
        Table::create()
            .table(ident(COMMENTS))
            .if_not_exists()
            .col(&mut primary_id())
            .col(&mut id_column("video_id"))
            .col(&mut id_column("user_id"))
            .col(&mut text_column("content", 2048))
            .col(&mut id_column("created_at"))
            .to_owned(),
        Table::create()
            .table(ident(FAVORITES))
            .if_not_exists()
            .col(&mut id_column("user_id"))
            .col(&mut id_column("video_id"))
            .col(&mut id_column("created_at"))
            .primary_key(
                Index::create()
                    .col(ident("user_id"))
                    .col(ident("video_id")),
            )
            .to_owned(),
        Table::create()
            .table(ident(FOLLOWS))
            .if_not_exists()
            .col(&mut primary_id())
            .col(&mut id_column("from_user_id"))
            .col(&mut id_column("to_user_id"))
            .col(&mut id_column("created_at"))
            .col(&mut id_column("updated_at"))
            .to_owned(),
    ]
}

/// 索引语句
///
/// 覆盖按作用域加载索引（作者、视频）和分组计数的查询
pub fn create_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .if_not_exists()
            .name("idx_videos_author_created")
            .table(ident(VIDEOS))
            .col(ident("author_id"))
            .col(ident("created_at"))
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_videos_created")
            .table(ident(VIDEOS))
            .col(ident("created_at"))
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_comments_video_created")
            .table(ident(COMMENTS))
            .col(ident("video_id"))
            .col(ident("created_at"))
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_favorites_video")
            .table(ident(FAVORITES))
            .col(ident("video_id"))
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("uk_follows_pair")
            .table(ident(FOLLOWS))
            .col(ident("from_user_id"))
            .col(ident("to_user_id"))
            .unique()
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_follows_to")
            .table(ident(FOLLOWS))
            .col(ident("to_user_id"))
            .to_owned(),
    ]
}
