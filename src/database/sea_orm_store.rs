//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Sea-ORM的关系型存储实现。

use super::connection_string::{ensure_database_directory, is_memory_sqlite};
use super::schema::{self, ident, COMMENTS, FAVORITES, FOLLOWS, USERS, VIDEOS};
use super::{RecordStore, RecordTx};
use crate::config::DatabaseConfig;
use crate::error::{Result, SyncError};
use crate::model::{datetime_from_millis, Comment, FollowEdge, User, UserStats, Video};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func, Order, Query, SimpleExpr};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, QueryResult, Statement, TransactionTrait,
};
use secrecy::ExposeSecret;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const VIDEO_COLUMNS: [&str; 6] = [
    "id",
    "author_id",
    "title",
    "play_url",
    "cover_url",
    "created_at",
];
const COMMENT_COLUMNS: [&str; 5] = ["id", "video_id", "user_id", "content", "created_at"];
const USER_COLUMNS: [&str; 3] = ["id", "name", "created_at"];

/// 业务ID转换为数据库ID
fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id)
        .map_err(|_| SyncError::Validation(format!("id {} exceeds the storable range", id)))
}

fn to_db_ids(ids: &[u64]) -> Result<Vec<i64>> {
    ids.iter().map(|id| to_db_id(*id)).collect()
}

fn from_db_id(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| SyncError::Serialization(format!("negative id {} in store", value)))
}

fn video_from_row(row: &QueryResult) -> Result<Video> {
    Ok(Video::new(
        from_db_id(row.try_get::<i64>("", "id")?)?,
        from_db_id(row.try_get::<i64>("", "author_id")?)?,
        row.try_get::<String>("", "title")?,
        row.try_get::<String>("", "play_url")?,
        row.try_get::<String>("", "cover_url")?,
        datetime_from_millis(row.try_get::<i64>("", "created_at")?)?,
    ))
}

fn comment_from_row(row: &QueryResult) -> Result<Comment> {
    Ok(Comment {
        comment_id: from_db_id(row.try_get::<i64>("", "id")?)?,
        video_id: from_db_id(row.try_get::<i64>("", "video_id")?)?,
        user_id: from_db_id(row.try_get::<i64>("", "user_id")?)?,
        content: row.try_get::<String>("", "content")?,
        created_at: datetime_from_millis(row.try_get::<i64>("", "created_at")?)?,
    })
}

fn user_from_row(row: &QueryResult) -> Result<User> {
    Ok(User {
        user_id: from_db_id(row.try_get::<i64>("", "id")?)?,
        name: row.try_get::<String>("", "name")?,
        created_at: datetime_from_millis(row.try_get::<i64>("", "created_at")?)?,
    })
}

/// 为单次存储调用附加超时
async fn with_timeout<T, F>(timeout: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sea_orm::DbErr>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SyncError::Timeout(format!(
            "Database {} timed out after {}ms",
            op,
            timeout.as_millis()
        ))),
    }
}

async fn query_rows<C: ConnectionTrait>(
    conn: &C,
    timeout: Duration,
    stmt: Statement,
) -> Result<Vec<QueryResult>> {
    with_timeout(timeout, "query", conn.query_all(stmt)).await
}

async fn execute<C: ConnectionTrait>(conn: &C, timeout: Duration, stmt: Statement) -> Result<u64> {
    let result = with_timeout(timeout, "execute", conn.execute(stmt)).await?;
    Ok(result.rows_affected())
}

/// 基于Sea-ORM的关系型存储
///
/// 语句由 sea_query 构建，按连接的数据库类型生成对应方言
pub struct SeaOrmRecordStore {
    db: DatabaseConnection,
    backend: DatabaseBackend,
    query_timeout: Duration,
}

impl std::fmt::Debug for SeaOrmRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmRecordStore")
            .field("backend", &self.backend)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl SeaOrmRecordStore {
    /// 根据配置建立连接池
    #[instrument(skip(config), level = "info", name = "init_record_store")]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = ensure_database_directory(config.url.expose_secret())?;

        let (max_connections, min_connections) = if is_memory_sqlite(&url) {
            // 内存库的每个连接都是一个独立的空库
            (1, 1)
        } else {
            (config.max_connections, config.min_connections)
        };

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .sqlx_logging(config.sqlx_logging);

        let db = Database::connect(opt).await?;
        let store = Self::from_connection(db, Duration::from_millis(config.query_timeout_ms));
        info!("Record store connected ({:?})", store.backend);
        Ok(store)
    }

    /// 使用已有连接创建存储
    pub fn from_connection(db: DatabaseConnection, query_timeout: Duration) -> Self {
        let backend = db.get_database_backend();
        Self {
            db,
            backend,
            query_timeout,
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// 创建缺失的表和索引
    #[instrument(skip(self), level = "info")]
    pub async fn migrate(&self) -> Result<()> {
        for stmt in schema::create_tables() {
            execute(&self.db, self.query_timeout, self.backend.build(&stmt)).await?;
        }
        for stmt in schema::create_indexes() {
            let result = execute(&self.db, self.query_timeout, self.backend.build(&stmt)).await;
            match result {
                Ok(_) => {}
                // MySQL 不支持 CREATE INDEX IF NOT EXISTS，重复执行时索引已存在
                Err(e) if self.backend == DatabaseBackend::MySql => {
                    warn!("Skipping index creation: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        info!("Database schema is up to date");
        Ok(())
    }

    async fn query(&self, stmt: Statement) -> Result<Vec<QueryResult>> {
        query_rows(&self.db, self.query_timeout, stmt).await
    }

    /// 按某列分组计数，结果列为 `scope_id` 与 `cnt`
    async fn grouped_counts(
        &self,
        table: &str,
        group_col: &str,
        ids: &[u64],
    ) -> Result<HashMap<u64, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let stmt = Query::select()
            .expr_as(Expr::col(ident(group_col)), ident("scope_id"))
            .expr_as(Func::count(Expr::col(ident(group_col))), ident("cnt"))
            .from(ident(table))
            .and_where(Expr::col(ident(group_col)).is_in(to_db_ids(ids)?))
            .group_by_col(ident(group_col))
            .to_owned();
        self.collect_counts(self.backend.build(&stmt)).await
    }

    async fn collect_counts(&self, stmt: Statement) -> Result<HashMap<u64, i64>> {
        let rows = self.query(stmt).await?;
        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows.iter() {
            let scope_id = from_db_id(row.try_get::<i64>("", "scope_id")?)?;
            counts.insert(scope_id, row.try_get::<i64>("", "cnt")?);
        }
        Ok(counts)
    }

    /// 作品获赞总数：点赞关系关联视频，按作者分组
    async fn total_favorited(&self, author_ids: &[u64]) -> Result<HashMap<u64, i64>> {
        let stmt = Query::select()
            .expr_as(Expr::col((ident(VIDEOS), ident("author_id"))), ident("scope_id"))
            .expr_as(
                Func::count(Expr::col((ident(FAVORITES), ident("video_id")))),
                ident("cnt"),
            )
            .from(ident(FAVORITES))
            .inner_join(
                ident(VIDEOS),
                Expr::col((ident(VIDEOS), ident("id")))
                    .equals((ident(FAVORITES), ident("video_id"))),
            )
            .and_where(Expr::col((ident(VIDEOS), ident("author_id"))).is_in(to_db_ids(author_ids)?))
            .group_by_col((ident(VIDEOS), ident("author_id")))
            .to_owned();
        self.collect_counts(self.backend.build(&stmt)).await
    }

    async fn ids_matching(
        &self,
        table: &str,
        select_col: &str,
        owner_col: &str,
        owner_id: u64,
        candidates: &[u64],
    ) -> Result<HashSet<u64>> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }
        let stmt = Query::select()
            .column(ident(select_col))
            .from(ident(table))
            .and_where(Expr::col(ident(owner_col)).eq(to_db_id(owner_id)?))
            .and_where(Expr::col(ident(select_col)).is_in(to_db_ids(candidates)?))
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        rows.iter()
            .map(|row| from_db_id(row.try_get::<i64>("", select_col)?))
            .collect()
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    #[instrument(skip(self, ids), level = "debug", fields(count = ids.len()))]
    async fn videos_by_ids(&self, ids: &[u64]) -> Result<Vec<Video>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = Query::select()
            .columns(VIDEO_COLUMNS.iter().map(|c| ident(c)))
            .from(ident(VIDEOS))
            .and_where(Expr::col(ident("id")).is_in(to_db_ids(ids)?))
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        rows.iter().map(video_from_row).collect()
    }

    #[instrument(skip(self), level = "debug")]
    async fn videos_by_author(&self, author_id: u64) -> Result<Vec<Video>> {
        let stmt = Query::select()
            .columns(VIDEO_COLUMNS.iter().map(|c| ident(c)))
            .from(ident(VIDEOS))
            .and_where(Expr::col(ident("author_id")).eq(to_db_id(author_id)?))
            .order_by(ident("created_at"), Order::Desc)
            .order_by(ident("id"), Order::Desc)
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        rows.iter().map(video_from_row).collect()
    }

    #[instrument(skip(self), level = "debug")]
    async fn all_videos(&self) -> Result<Vec<Video>> {
        let stmt = Query::select()
            .columns(VIDEO_COLUMNS.iter().map(|c| ident(c)))
            .from(ident(VIDEOS))
            .order_by(ident("created_at"), Order::Desc)
            .order_by(ident("id"), Order::Desc)
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        debug!("Loaded {} videos for the global feed", rows.len());
        rows.iter().map(video_from_row).collect()
    }

    #[instrument(skip(self, video), level = "debug", fields(video_id = video.video_id))]
    async fn insert_video(&self, video: &Video) -> Result<()> {
        let values: Vec<SimpleExpr> = vec![
            to_db_id(video.video_id)?.into(),
            to_db_id(video.author_id)?.into(),
            video.title.clone().into(),
            video.play_url.clone().into(),
            video.cover_url.clone().into(),
            video.created_at.timestamp_millis().into(),
        ];
        let stmt = Query::insert()
            .into_table(ident(VIDEOS))
            .columns(VIDEO_COLUMNS.iter().map(|c| ident(c)))
            .values(values)
            .map_err(|e| SyncError::DatabaseError(e.to_string()))?
            .to_owned();
        execute(&self.db, self.query_timeout, self.backend.build(&stmt)).await?;
        Ok(())
    }

    #[instrument(skip(self, ids), level = "debug", fields(count = ids.len()))]
    async fn comments_by_ids(&self, ids: &[u64]) -> Result<Vec<Comment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = Query::select()
            .columns(COMMENT_COLUMNS.iter().map(|c| ident(c)))
            .from(ident(COMMENTS))
            .and_where(Expr::col(ident("id")).is_in(to_db_ids(ids)?))
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        rows.iter().map(comment_from_row).collect()
    }

    #[instrument(skip(self), level = "debug")]
    async fn comments_by_video(&self, video_id: u64) -> Result<Vec<Comment>> {
        let stmt = Query::select()
            .columns(COMMENT_COLUMNS.iter().map(|c| ident(c)))
            .from(ident(COMMENTS))
            .and_where(Expr::col(ident("video_id")).eq(to_db_id(video_id)?))
            .order_by(ident("created_at"), Order::Desc)
            .order_by(ident("id"), Order::Desc)
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        rows.iter().map(comment_from_row).collect()
    }

    #[instrument(skip(self, video_ids), level = "debug", fields(count = video_ids.len()))]
    async fn comment_counts(&self, video_ids: &[u64]) -> Result<HashMap<u64, i64>> {
        self.grouped_counts(COMMENTS, "video_id", video_ids).await
    }

    #[instrument(skip(self, video_ids), level = "debug", fields(count = video_ids.len()))]
    async fn favorite_counts(&self, video_ids: &[u64]) -> Result<HashMap<u64, i64>> {
        self.grouped_counts(FAVORITES, "video_id", video_ids).await
    }

    #[instrument(skip(self, video_ids), level = "debug", fields(count = video_ids.len()))]
    async fn favorited_videos(&self, user_id: u64, video_ids: &[u64]) -> Result<HashSet<u64>> {
        self.ids_matching(FAVORITES, "video_id", "user_id", user_id, video_ids)
            .await
    }

    #[instrument(skip(self, ids), level = "debug", fields(count = ids.len()))]
    async fn users_by_ids(&self, ids: &[u64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = Query::select()
            .columns(USER_COLUMNS.iter().map(|c| ident(c)))
            .from(ident(USERS))
            .and_where(Expr::col(ident("id")).is_in(to_db_ids(ids)?))
            .to_owned();
        let rows = self.query(self.backend.build(&stmt)).await?;
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self, user), level = "debug", fields(user_id = user.user_id))]
    async fn insert_user(&self, user: &User) -> Result<()> {
        let values: Vec<SimpleExpr> = vec![
            to_db_id(user.user_id)?.into(),
            user.name.clone().into(),
            user.created_at.timestamp_millis().into(),
        ];
        let stmt = Query::insert()
            .into_table(ident(USERS))
            .columns(USER_COLUMNS.iter().map(|c| ident(c)))
            .values(values)
            .map_err(|e| SyncError::DatabaseError(e.to_string()))?
            .to_owned();
        execute(&self.db, self.query_timeout, self.backend.build(&stmt)).await?;
        Ok(())
    }

    #[instrument(skip(self, user_ids), level = "debug", fields(count = user_ids.len()))]
    async fn user_stats(&self, user_ids: &[u64]) -> Result<HashMap<u64, UserStats>> {
        let mut stats: HashMap<u64, UserStats> = user_ids
            .iter()
            .map(|id| (*id, UserStats::default()))
            .collect();
        if user_ids.is_empty() {
            return Ok(stats);
        }

        let follow = self.grouped_counts(FOLLOWS, "from_user_id", user_ids).await?;
        let follower = self.grouped_counts(FOLLOWS, "to_user_id", user_ids).await?;
        let work = self.grouped_counts(VIDEOS, "author_id", user_ids).await?;
        let favorite = self.grouped_counts(FAVORITES, "user_id", user_ids).await?;
        let favorited = self.total_favorited(user_ids).await?;

        for (user_id, entry) in stats.iter_mut() {
            entry.follow_count = follow.get(user_id).copied().unwrap_or(0);
            entry.follower_count = follower.get(user_id).copied().unwrap_or(0);
            entry.work_count = work.get(user_id).copied().unwrap_or(0);
            entry.favorite_count = favorite.get(user_id).copied().unwrap_or(0);
            entry.total_favorited = favorited.get(user_id).copied().unwrap_or(0);
        }
        Ok(stats)
    }

    #[instrument(skip(self, user_ids), level = "debug", fields(count = user_ids.len()))]
    async fn followed_among(&self, from_user_id: u64, user_ids: &[u64]) -> Result<HashSet<u64>> {
        self.ids_matching(FOLLOWS, "to_user_id", "from_user_id", from_user_id, user_ids)
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn begin(&self) -> Result<Box<dyn RecordTx>> {
        let tx = with_timeout(self.query_timeout, "begin", self.db.begin()).await?;
        Ok(Box::new(SeaOrmRecordTx {
            tx,
            backend: self.backend,
            query_timeout: self.query_timeout,
        }))
    }

    async fn ping(&self) -> Result<()> {
        with_timeout(self.query_timeout, "ping", self.db.ping()).await
    }
}

/// Sea-ORM事务
pub struct SeaOrmRecordTx {
    tx: DatabaseTransaction,
    backend: DatabaseBackend,
    query_timeout: Duration,
}

impl SeaOrmRecordTx {
    async fn execute(&self, stmt: Statement) -> Result<u64> {
        execute(&self.tx, self.query_timeout, stmt).await
    }

    async fn pair_exists(
        &self,
        table: &str,
        (left_col, left): (&str, u64),
        (right_col, right): (&str, u64),
    ) -> Result<bool> {
        let stmt = Query::select()
            .column(ident(left_col))
            .from(ident(table))
            .and_where(Expr::col(ident(left_col)).eq(to_db_id(left)?))
            .and_where(Expr::col(ident(right_col)).eq(to_db_id(right)?))
            .limit(1)
            .to_owned();
        let rows = query_rows(&self.tx, self.query_timeout, self.backend.build(&stmt)).await?;
        Ok(!rows.is_empty())
    }

    async fn delete_pair(
        &self,
        table: &str,
        (left_col, left): (&str, u64),
        (right_col, right): (&str, u64),
    ) -> Result<u64> {
        let stmt = Query::delete()
            .from_table(ident(table))
            .and_where(Expr::col(ident(left_col)).eq(to_db_id(left)?))
            .and_where(Expr::col(ident(right_col)).eq(to_db_id(right)?))
            .to_owned();
        self.execute(self.backend.build(&stmt)).await
    }
}

#[async_trait]
impl RecordTx for SeaOrmRecordTx {
    #[instrument(skip(self, comment), level = "debug", fields(comment_id = comment.comment_id))]
    async fn insert_comment(&mut self, comment: &Comment) -> Result<()> {
        let values: Vec<SimpleExpr> = vec![
            to_db_id(comment.comment_id)?.into(),
            to_db_id(comment.video_id)?.into(),
            to_db_id(comment.user_id)?.into(),
            comment.content.clone().into(),
            comment.created_at.timestamp_millis().into(),
        ];
        let stmt = Query::insert()
            .into_table(ident(COMMENTS))
            .columns(COMMENT_COLUMNS.iter().map(|c| ident(c)))
            .values(values)
            .map_err(|e| SyncError::DatabaseError(e.to_string()))?
            .to_owned();
        self.execute(self.backend.build(&stmt)).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_comment(
        &mut self,
        comment_id: u64,
        user_id: u64,
        video_id: u64,
    ) -> Result<u64> {
        let stmt = Query::delete()
            .from_table(ident(COMMENTS))
            .and_where(Expr::col(ident("id")).eq(to_db_id(comment_id)?))
            .and_where(Expr::col(ident("user_id")).eq(to_db_id(user_id)?))
            .and_where(Expr::col(ident("video_id")).eq(to_db_id(video_id)?))
            .to_owned();
        self.execute(self.backend.build(&stmt)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn insert_favorite(&mut self, user_id: u64, video_id: u64) -> Result<bool> {
        if self
            .pair_exists(FAVORITES, ("user_id", user_id), ("video_id", video_id))
            .await?
        {
            return Ok(false);
        }
        let values: Vec<SimpleExpr> = vec![
            to_db_id(user_id)?.into(),
            to_db_id(video_id)?.into(),
            crate::model::now_millis().timestamp_millis().into(),
        ];
        let stmt = Query::insert()
            .into_table(ident(FAVORITES))
            .columns([ident("user_id"), ident("video_id"), ident("created_at")])
            .values(values)
            .map_err(|e| SyncError::DatabaseError(e.to_string()))?
            .to_owned();
        self.execute(self.backend.build(&stmt)).await?;
        Ok(true)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_favorite(&mut self, user_id: u64, video_id: u64) -> Result<bool> {
        let affected = self
            .delete_pair(FAVORITES, ("user_id", user_id), ("video_id", video_id))
            .await?;
        Ok(affected > 0)
    }

    #[instrument(skip(self, edge), level = "debug", fields(from = edge.from_user_id, to = edge.to_user_id))]
    async fn insert_follow(&mut self, edge: &FollowEdge) -> Result<bool> {
        if self
            .pair_exists(
                FOLLOWS,
                ("from_user_id", edge.from_user_id),
                ("to_user_id", edge.to_user_id),
            )
            .await?
        {
            return Ok(false);
        }
        let values: Vec<SimpleExpr> = vec![
            to_db_id(edge.follow_id)?.into(),
            to_db_id(edge.from_user_id)?.into(),
            to_db_id(edge.to_user_id)?.into(),
            edge.created_at.timestamp_millis().into(),
            edge.updated_at.timestamp_millis().into(),
        ];
        let stmt = Query::insert()
            .into_table(ident(FOLLOWS))
            .columns([
                ident("id"),
                ident("from_user_id"),
                ident("to_user_id"),
                ident("created_at"),
                ident("updated_at"),
            ])
            .values(values)
            .map_err(|e| SyncError::DatabaseError(e.to_string()))?
            .to_owned();
        self.execute(self.backend.build(&stmt)).await?;
        Ok(true)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_follow(&mut self, from_user_id: u64, to_user_id: u64) -> Result<bool> {
        let affected = self
            .delete_pair(
                FOLLOWS,
                ("from_user_id", from_user_id),
                ("to_user_id", to_user_id),
            )
            .await?;
        Ok(affected > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let timeout = self.query_timeout;
        with_timeout(timeout, "commit", self.tx.commit()).await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let timeout = self.query_timeout;
        with_timeout(timeout, "rollback", self.tx.rollback()).await
    }
}
