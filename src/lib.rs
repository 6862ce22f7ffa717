//! feedsync - 短视频社交后端的缓存同步层
//!
//! 以关系型存储为唯一事实来源，维护Redis中的时间索引、实体快照和聚合计数：
//! 旁路读取与批量回源、空集合标记、写入时同步填充，以及按时间窗口分页。

#![doc(html_root_url = "https://docs.rs/feedsync/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod id;
pub mod keys;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod service;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use backend::{CacheStore, MemoryCacheStore, RedisCacheStore};
pub use cache::{CountAggregator, CountKind, EntityCache, IndexCache, Window};
pub use config::Config;
pub use database::{RecordStore, RecordTx, SeaOrmRecordStore};
pub use error::{ErrorKind, Result, SyncError};
pub use id::{ClockIdGenerator, IdGenerator};
pub use keys::{IndexScope, KeyScheme};
pub use manager::FeedSyncManager;
pub use metrics::Metrics;
pub use service::{
    CommentService, CommentView, ConsistencyCoordinator, FeedPage, UserService, VideoService,
    VideoView,
};

/// feedsync 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
