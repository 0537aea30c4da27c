//! # Observability
//!
//! 可观测性基础设施。负责初始化整条流水线共用的结构化日志
//! 与 Prometheus 指标导出器，其余 crate 只管调用 `tracing` 宏
//! 和 `metrics` 宏，不关心后端如何配置。
//!
//! ## 功能
//!
//! - 结构化日志：基于 `tracing` + `tracing-subscriber`，支持
//!   JSON / Pretty / Compact 三种输出格式
//! - 日志过滤：优先读取 `FRAMELOCK_LOG` 环境变量，未设置时退回
//!   配置中的默认级别
//! - 指标导出：通过 `metrics-exporter-prometheus` 在指定端口
//!   暴露 `/metrics` HTTP 端点
//! - 汇总统计：[`metrics::StampMetricsAggregator`] 在进程内累积
//!   打戳结果，退出时打印一份人类可读的摘要
//!
//! ## 使用示例
//!
//! ```no_run
//! use observability::{ObservabilityConfig, LogFormat};
//!
//! fn main() -> anyhow::Result<()> {
//!     // 开发环境：彩色日志 + 本地指标端口
//!     observability::init_with_config(ObservabilityConfig {
//!         log_format: LogFormat::Pretty,
//!         metrics_port: Some(9200),
//!         default_log_level: "debug".to_string(),
//!     })?;
//!
//!     tracing::info!("pipeline starting");
//!     Ok(())
//! }
//! ```

pub mod metrics;

// Re-exports
pub use crate::metrics::{
    MetricsSummary, RunningStats, StampMetricsAggregator, StatsSummary, record_dispatch_lag_ms,
    record_frame_dispatched, record_sink_dropped, record_sink_queue_depth,
};

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 格式，适合生产环境被日志采集器消费
    #[default]
    Json,
    /// 多行彩色格式，适合本地调试
    Pretty,
    /// 单行紧凑格式
    Compact,
}

/// 可观测性初始化配置。
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志输出格式
    pub log_format: LogFormat,
    /// Prometheus 指标端口，`None` 表示不启动导出器
    pub metrics_port: Option<u16>,
    /// `FRAMELOCK_LOG` 未设置时使用的日志级别
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// 以默认配置初始化日志与指标。
///
/// 等价于 `init_with_config(ObservabilityConfig::default())`。
pub fn init() -> anyhow::Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 按给定配置初始化日志与指标。
///
/// 只能在进程生命周期内调用一次，重复调用会因为全局
/// subscriber 已注册而返回错误。
pub fn init_with_config(config: ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_env("FRAMELOCK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .context("初始化 JSON 日志失败")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .context("初始化 Pretty 日志失败")?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .context("初始化 Compact 日志失败")?;
        }
    }

    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }

    Ok(())
}

/// 只初始化 Prometheus 指标导出器，不接管日志。
///
/// 测试或嵌入场景下宿主可能已经配置了自己的 subscriber，
/// 此时仍可以单独启动指标端点。
pub fn init_metrics_only(port: u16) -> anyhow::Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("启动 Prometheus 导出器失败 (port {port})"))?;
    tracing::info!(port, "Prometheus metrics endpoint ready");
    Ok(())
}
