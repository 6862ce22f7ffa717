//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于进程内存的缓存存储实现，语义与Redis保持一致。

use super::{CacheStore, HashWrite};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
enum MemValue {
    Flag,
    Hash(HashMap<String, String>),
    ZSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct MemEntry {
    value: MemValue,
    expire_at: Instant,
}

impl MemEntry {
    fn new(value: MemValue, ttl: Duration) -> Self {
        Self {
            value,
            expire_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expire_at
    }
}

fn wrong_type(key: &str) -> SyncError {
    SyncError::BackendError(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
        key
    ))
}

/// 分值从高到低，同分时按成员字典序从大到小（与 ZREVRANGE 一致）
fn rev_sorted(members: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut items: Vec<(String, f64)> = members.iter().map(|(m, s)| (m.clone(), *s)).collect();
    items.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.0.cmp(&a.0))
    });
    items
}

/// 进程内存缓存存储
///
/// 每个键保存一个过期时刻，过期的键在下一次访问时被清除
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, MemEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未过期的键数量
    pub fn len(&self) -> usize {
        self.entries.retain(|_, entry| !entry.is_expired());
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空所有键
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn purge_if_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
    }

    fn hash_write(&self, key: &str, fields: &[(String, String)], ttl: Duration) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.purge_if_expired(key);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemEntry::new(MemValue::Hash(HashMap::new()), ttl));
        match &mut entry.value {
            MemValue::Hash(map) => {
                for (field, value) in fields {
                    map.insert(field.clone(), value.clone());
                }
            }
            _ => return Err(wrong_type(key)),
        }
        entry.expire_at = Instant::now() + ttl;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool> {
        self.purge_if_expired(key);
        Ok(self.entries.contains_key(key))
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_flag(&self, key: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), MemEntry::new(MemValue::Flag, ttl));
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expire_at = Instant::now() + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    #[instrument(skip(self, fields), level = "debug", fields(field_count = fields.len()))]
    async fn hset_all(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<()> {
        self.hash_write(key, fields, ttl)
    }

    #[instrument(skip(self, items), level = "debug", fields(item_count = items.len()))]
    async fn pipeline_hset_batch(&self, items: Vec<HashWrite>) -> Result<()> {
        for (key, fields, ttl) in items {
            self.hash_write(&key, &fields, ttl)?;
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                MemValue::Hash(map) => Ok(map.get(field).cloned()),
                _ => Err(wrong_type(key)),
            },
            None => Ok(None),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                MemValue::Hash(map) => Ok(map.clone()),
                _ => Err(wrong_type(key)),
            },
            None => Ok(HashMap::new()),
        }
    }

    #[instrument(skip(self, items), level = "debug", fields(item_count = items.len()))]
    async fn pipeline_hget_all(
        &self,
        items: &[(String, Duration)],
    ) -> Result<Vec<HashMap<String, String>>> {
        let mut snapshots = Vec::with_capacity(items.len());
        for (key, ttl) in items {
            self.purge_if_expired(key);
            match self.entries.get_mut(key.as_str()) {
                Some(mut entry) => {
                    let map = match &entry.value {
                        MemValue::Hash(map) => map.clone(),
                        _ => return Err(wrong_type(key)),
                    };
                    entry.expire_at = Instant::now() + *ttl;
                    snapshots.push(map);
                }
                None => snapshots.push(HashMap::new()),
            }
        }
        debug!("Batch read {} hashes", snapshots.len());
        Ok(snapshots)
    }

    #[instrument(skip(self), level = "debug")]
    async fn hset_if_exists(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => match &mut entry.value {
                MemValue::Hash(map) => {
                    map.insert(field.to_string(), value.to_string());
                    Ok(true)
                }
                _ => Err(wrong_type(key)),
            },
            None => Ok(false),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        self.purge_if_expired(key);
        let now_empty = match self.entries.get_mut(key) {
            Some(mut entry) => match &mut entry.value {
                MemValue::Hash(map) => {
                    map.remove(field);
                    map.is_empty()
                }
                _ => return Err(wrong_type(key)),
            },
            None => false,
        };
        if now_empty {
            self.entries.remove(key);
        }
        Ok(())
    }

    #[instrument(skip(self, members), level = "debug", fields(member_count = members.len()))]
    async fn zadd(&self, key: &str, members: &[(f64, String)], ttl: Duration) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.purge_if_expired(key);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemEntry::new(MemValue::ZSet(HashMap::new()), ttl));
        match &mut entry.value {
            MemValue::ZSet(set) => {
                for (score, member) in members {
                    set.insert(member.clone(), *score);
                }
            }
            _ => return Err(wrong_type(key)),
        }
        entry.expire_at = Instant::now() + ttl;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn zadd_if_exists(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl: Duration,
    ) -> Result<bool> {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                match &mut entry.value {
                    MemValue::ZSet(set) => {
                        set.insert(member.to_string(), score);
                    }
                    _ => return Err(wrong_type(key)),
                }
                entry.expire_at = Instant::now() + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        self.purge_if_expired(key);
        let (removed, now_empty) = match self.entries.get_mut(key) {
            Some(mut entry) => match &mut entry.value {
                MemValue::ZSet(set) => {
                    let removed = set.remove(member).is_some();
                    (removed, set.is_empty())
                }
                _ => return Err(wrong_type(key)),
            },
            None => (false, false),
        };
        // Redis 在集合为空时删除键
        if now_empty {
            debug!("Sorted set {} became empty, removing key", key);
            self.entries.remove(key);
        }
        Ok(removed)
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrevrange(&self, key: &str) -> Result<Vec<String>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                MemValue::ZSet(set) => Ok(rev_sorted(set).into_iter().map(|(m, _)| m).collect()),
                _ => Err(wrong_type(key)),
            },
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn zrevrange_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                MemValue::ZSet(set) => Ok(rev_sorted(set)
                    .into_iter()
                    .filter(|(_, score)| *score <= max && *score >= min)
                    .take(limit)
                    .map(|(m, _)| m)
                    .collect()),
                _ => Err(wrong_type(key)),
            },
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn zcard(&self, key: &str) -> Result<u64> {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                MemValue::ZSet(set) => Ok(set.len() as u64),
                _ => Err(wrong_type(key)),
            },
            None => Ok(0),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
