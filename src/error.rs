//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存同步层的错误类型和错误分类。

use thiserror::Error;

/// 缓存同步层错误类型枚举
///
/// 存储类错误（Redis、数据库、超时、后端）统一归类为 `StoreUnavailable`，
/// 调用方应通过 [`SyncError::kind`] 判断错误类别，而不是匹配具体变体。
#[derive(Error, Debug)]
pub enum SyncError {
    /// 调用方输入不合法，在访问任何存储之前被拒绝
    #[error("Validation error: {0}")]
    Validation(String),

    /// 缓存与数据库均确认实体不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 非所有者或错误作用域的删除（受影响行数为零）
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// 数据库写入已完成，但配对的缓存写入失败
    #[error("Consistency abort: {0}")]
    ConsistencyAbort(String),

    /// ID生成失败
    #[error("ID generation error: {0}")]
    IdGeneration(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 快照或索引成员无法解析
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Sea-ORM数据库错误
    #[error("Sea-ORM error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// 数据库语句构建错误
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 缓存后端错误
    #[error("Backend error: {0}")]
    BackendError(String),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),
}

/// 错误类别
///
/// 上层（HTTP层）根据类别映射不同的响应码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    StoreUnavailable,
    ConsistencyAbort,
    IdGeneration,
    Configuration,
}

impl SyncError {
    /// 返回错误所属的类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Authorization(_) => ErrorKind::Authorization,
            SyncError::ConsistencyAbort(_) => ErrorKind::ConsistencyAbort,
            SyncError::IdGeneration(_) => ErrorKind::IdGeneration,
            SyncError::Configuration(_) => ErrorKind::Configuration,
            SyncError::Serialization(_)
            | SyncError::RedisError(_)
            | SyncError::SeaOrmError(_)
            | SyncError::DatabaseError(_)
            | SyncError::BackendError(_)
            | SyncError::Timeout(_) => ErrorKind::StoreUnavailable,
        }
    }

    /// 是否为存储不可用类错误
    pub fn is_store_unavailable(&self) -> bool {
        self.kind() == ErrorKind::StoreUnavailable
    }
}

/// 缓存同步层操作结果类型别名
pub type Result<T> = std::result::Result<T, SyncError>;
