//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块负责关系型存储连接串的识别与规范化。

use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};

/// 数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    SQLite,
    MySQL,
    PostgreSQL,
}

impl DbType {
    /// 从连接字符串推断数据库类型，无法识别的按SQLite处理
    pub fn from_connection_string(s: &str) -> Self {
        let lower = s.to_lowercase();
        if lower.starts_with("mysql") {
            DbType::MySQL
        } else if lower.starts_with("postgres") {
            DbType::PostgreSQL
        } else {
            DbType::SQLite
        }
    }
}

/// 是否为SQLite内存库
pub fn is_memory_sqlite(s: &str) -> bool {
    DbType::from_connection_string(s) == DbType::SQLite && s.contains(":memory:")
}

/// 提取SQLite文件路径，内存库或其他数据库返回 None
pub fn extract_sqlite_path(s: &str) -> Option<PathBuf> {
    if DbType::from_connection_string(s) != DbType::SQLite || is_memory_sqlite(s) {
        return None;
    }
    let rest = s.strip_prefix("sqlite:").unwrap_or(s);
    let path = rest.split('?').next().unwrap_or(rest);
    let path = if let Some(stripped) = path.strip_prefix("///") {
        format!("/{}", stripped)
    } else if let Some(stripped) = path.strip_prefix("//") {
        stripped.to_string()
    } else {
        path.to_string()
    };
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// 规范化连接串
///
/// SQLite文件库补充 `mode=rwc`，使首次启动时自动创建数据库文件；
/// 其余连接串原样返回
pub fn normalize_connection_string(s: &str) -> String {
    match extract_sqlite_path(s) {
        Some(path) => {
            let params = s.split_once('?').map(|(_, p)| p).unwrap_or("");
            if params.contains("mode=") {
                format!("sqlite://{}?{}", path.display(), params)
            } else if params.is_empty() {
                format!("sqlite://{}?mode=rwc", path.display())
            } else {
                format!("sqlite://{}?{}&mode=rwc", path.display(), params)
            }
        }
        None => s.to_string(),
    }
}

/// 确保SQLite数据库文件所在目录存在，并返回规范化后的连接串
pub fn ensure_database_directory(connection_string: &str) -> Result<String> {
    if let Some(path) = extract_sqlite_path(connection_string) {
        let full_path = if path.is_absolute() {
            path
        } else {
            std::env::current_dir()
                .map_err(|e| SyncError::DatabaseError(format!("Cannot resolve cwd: {}", e)))?
                .join(path)
        };
        if let Some(parent) = full_path.parent() {
            ensure_dir(parent)?;
        }
    }
    Ok(normalize_connection_string(connection_string))
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| {
        SyncError::DatabaseError(format!(
            "Cannot create database directory {}: {}",
            dir.display(),
            e
        ))
    })
}
