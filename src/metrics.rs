//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存同步层的指标收集功能。

use dashmap::DashMap;
use std::fmt::Write;
use tracing::{span, Level};

/// 指标收集器
///
/// 以实例形式注入到各组件中，便于测试中对单个组件栈断言
#[derive(Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    /// key: "component:op:result"
    requests_total: DashMap<String, u64>,
    /// 操作耗时 key: "component:op" -> (total_duration_secs, count)
    operation_duration: DashMap<String, (f64, u64)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `component` - 组件名称（如 `entity:video`、`index:feed`）
    /// * `op` - 操作类型
    /// * `result` - 操作结果（hit/miss/fallback/abort 等）
    pub fn record(&self, component: &str, op: &str, result: &str) {
        self.record_n(component, op, result, 1);
    }

    /// 一次性记录多次同类请求
    pub fn record_n(&self, component: &str, op: &str, result: &str, n: u64) {
        if n == 0 {
            return;
        }
        let span = span!(Level::TRACE, "sync_metric", component, op, result);
        let _enter = span.enter();
        let key = format!("{}:{}:{}", component, op, result);
        *self.requests_total.entry(key).or_insert(0) += n;
    }

    /// 记录操作耗时
    pub fn record_duration(&self, component: &str, op: &str, duration_secs: f64) {
        let key = format!("{}:{}", component, op);
        let mut entry = self.operation_duration.entry(key).or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 读取某个计数，不存在时为0
    pub fn count(&self, component: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", component, op, result);
        self.requests_total.get(&key).map(|v| *v).unwrap_or(0)
    }

    /// 以 Prometheus 文本格式输出全部指标
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for entry in self.requests_total.iter() {
            let parts: Vec<&str> = entry.key().split(':').collect();
            if let [component @ .., op, result] = parts.as_slice() {
                lines.push(format!(
                    "feedsync_requests_total{{component=\"{}\", op=\"{}\", result=\"{}\"}} {}",
                    component.join(":"),
                    op,
                    result,
                    entry.value()
                ));
            }
        }
        for entry in self.operation_duration.iter() {
            let (total, count) = *entry.value();
            if let Some((component, op)) = entry.key().rsplit_once(':') {
                lines.push(format!(
                    "feedsync_operation_duration_seconds_sum{{component=\"{}\", op=\"{}\"}} {}",
                    component, op, total
                ));
                lines.push(format!(
                    "feedsync_operation_duration_seconds_count{{component=\"{}\", op=\"{}\"}} {}",
                    component, op, count
                ));
            }
        }
        lines.sort();

        let mut output = String::new();
        for line in lines {
            let _ = writeln!(output, "{}", line);
        }
        output
    }
}
