//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了用户信息的读取与注册。

use crate::database::RecordStore;
use crate::error::{Result, SyncError};
use crate::id::IdGenerator;
use crate::model::{now_millis, User, UserProfile};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

const MAX_NAME_LENGTH: usize = 32;

/// 用户服务
///
/// 用户不做缓存，计数每次由分组查询得出
#[derive(Clone)]
pub struct UserService {
    records: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
}

impl UserService {
    pub fn new(records: Arc<dyn RecordStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { records, ids }
    }

    /// 注册用户
    #[instrument(skip(self), level = "info")]
    pub async fn create_user(&self, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(SyncError::Validation(format!(
                "user name must be 1..={} characters",
                MAX_NAME_LENGTH
            )));
        }
        let user = User {
            user_id: self.ids.next_id()?,
            name: name.to_string(),
            created_at: now_millis(),
        };
        self.records.insert_user(&user).await?;
        info!("Registered user {}", user.user_id);
        Ok(user)
    }

    /// 单个用户信息
    pub async fn profile(&self, user_id: u64, viewer: Option<u64>) -> Result<UserProfile> {
        self.profiles(&[user_id], viewer)
            .await?
            .pop()
            .ok_or_else(|| SyncError::NotFound(format!("user {}", user_id)))
    }

    /// 批量用户信息，输出顺序与请求顺序一致
    ///
    /// 任一用户不存在时返回 `NotFound`
    #[instrument(skip(self, user_ids), level = "debug", fields(count = user_ids.len()))]
    pub async fn profiles(&self, user_ids: &[u64], viewer: Option<u64>) -> Result<Vec<UserProfile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut seen = HashSet::with_capacity(user_ids.len());
        let unique: Vec<u64> = user_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let users: HashMap<u64, User> = self
            .records
            .users_by_ids(&unique)
            .await?
            .into_iter()
            .map(|user| (user.user_id, user))
            .collect();
        if let Some(missing) = unique.iter().find(|id| !users.contains_key(id)) {
            return Err(SyncError::NotFound(format!("user {}", missing)));
        }

        let stats = self.records.user_stats(&unique).await?;
        let followed = match viewer {
            Some(viewer_id) => self.records.followed_among(viewer_id, &unique).await?,
            None => HashSet::new(),
        };

        let mut profiles = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(user) = users.get(user_id) {
                profiles.push(UserProfile {
                    user_id: *user_id,
                    name: user.name.clone(),
                    stats: stats.get(user_id).copied().unwrap_or_default(),
                    is_follow: followed.contains(user_id),
                });
            }
        }
        Ok(profiles)
    }
}
