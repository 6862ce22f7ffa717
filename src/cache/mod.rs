//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存组件模块
//!
//! 实体快照、时间索引与计数聚合，三者共享同一个缓存存储和键方案。

pub mod counts;
pub mod entity;
pub mod index;

pub use counts::{CountAggregator, CountKind};
pub use entity::{CachedEntity, EntityCache};
pub use index::{IndexCache, Window};
