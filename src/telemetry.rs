//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步层的日志与链路追踪初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// 初始化日志与链路追踪
///
/// 安装控制台日志层（受 `RUST_LOG` 控制，缺省为 `default_level`）
/// 和 OpenTelemetry 层。全局 subscriber 已存在时静默跳过。
///
/// # 参数
///
/// * `service_name` - 追踪数据中的服务名称
/// * `default_level` - 未设置 `RUST_LOG` 时的日志级别
pub fn init_tracing(service_name: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 未配置导出器时 provider 不导出任何数据，只为span提供上下文
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());

    let subscriber = Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    let _ = tracing::subscriber::set_global_default(subscriber);
}
