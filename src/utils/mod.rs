//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 统一工具模块
//!
//! 提供测试和命令行共用的工具函数：日志设置、Redis连通性检查、键前缀生成。

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 测试用日志，只初始化一次
pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 是否允许运行依赖Redis的测试
pub fn is_redis_enabled() -> bool {
    std::env::var("FEEDSYNC_SKIP_REDIS_TESTS").is_err()
}

/// 检查指定URL的Redis是否可连接
pub async fn is_redis_available_url(url: &str) -> bool {
    let client = match redis::Client::open(url) {
        Ok(c) => c,
        Err(_) => return false,
    };

    matches!(
        tokio::time::timeout(
            Duration::from_secs(1),
            client.get_multiplexed_async_connection(),
        )
        .await,
        Ok(Ok(_))
    )
}

/// 生成唯一的键前缀，使多次测试运行可以共用一个缓存实例
pub fn unique_key_prefix(base: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{}_{}", base, suffix.to_lowercase())
}
