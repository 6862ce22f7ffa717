//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了ID生成接口。

use crate::error::{Result, SyncError};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// ID生成器
///
/// 生成的ID必须唯一且不超过 `i64::MAX`
#[cfg_attr(test, mockall::automock)]
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Result<u64>;
}

const SEQUENCE_BITS: u32 = 12;

/// 基于时钟的单进程ID生成器
///
/// 高位为毫秒时间戳，低12位为同一毫秒内的序号；时钟回拨时沿用上一个ID递增
#[derive(Debug, Default)]
pub struct ClockIdGenerator {
    last: AtomicU64,
}

impl ClockIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for ClockIdGenerator {
    fn next_id(&self) -> Result<u64> {
        let millis = Utc::now().timestamp_millis();
        let millis = u64::try_from(millis)
            .map_err(|_| SyncError::IdGeneration(format!("clock before epoch: {}", millis)))?;
        let candidate = millis << SEQUENCE_BITS;

        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .map_err(|_| SyncError::IdGeneration("id sequence update failed".to_string()))?;
        let id = candidate.max(previous + 1);
        if id > i64::MAX as u64 {
            return Err(SyncError::IdGeneration(format!("id space exhausted: {}", id)));
        }
        Ok(id)
    }
}
