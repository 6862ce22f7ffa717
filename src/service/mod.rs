//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 业务服务模块
//!
//! 读服务组合缓存组件并补充附属数据；写操作统一经由 [`ConsistencyCoordinator`]。

pub mod comment;
pub mod coordinator;
pub mod user;
pub mod video;

pub use comment::{CommentService, CommentView};
pub use coordinator::ConsistencyCoordinator;
pub use user::UserService;
pub use video::{FeedPage, VideoService, VideoView};
