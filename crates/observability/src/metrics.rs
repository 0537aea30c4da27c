//! 指标记录与汇总。
//!
//! 两套互补的机制：
//!
//! 1. **Prometheus 指标**：`record_*` 系列函数封装 `metrics` 宏，
//!    供分发端在热路径上调用。同步引擎自身的指标
//!    (`framelock_frames_total`、`framelock_desync_total` 等)
//!    由引擎内部直接上报，不经过本模块。
//! 2. **进程内汇总**：[`StampMetricsAggregator`] 累积每一帧的
//!    打戳元数据，进程退出时打印一份可读摘要，便于离线回放
//!    和 CI 日志中快速判断同步质量。
//!
//! ## 指标清单
//!
//! | 名称 | 类型 | 标签 |
//! |------|------|------|
//! | `framelock_frames_dispatched_total` | counter | `sink`, `status` |
//! | `framelock_sink_dropped_total` | counter | `sink` |
//! | `framelock_dispatch_lag_ms` | histogram | `sink` |
//! | `framelock_sink_queue_depth` | gauge | `sink` |

use std::collections::HashMap;
use std::fmt;

use contracts::{StampSource, StampedFrame};
use metrics::{counter, gauge, histogram};

/// 记录一次向下游 sink 的帧投递结果。
pub fn record_frame_dispatched(sink: &str, success: bool) {
    let status = if success { "ok" } else { "error" };
    counter!(
        "framelock_frames_dispatched_total",
        "sink" => sink.to_string(),
        "status" => status,
    )
    .increment(1);
}

/// 记录 sink 队列满导致的丢帧。
pub fn record_sink_dropped(sink: &str) {
    counter!("framelock_sink_dropped_total", "sink" => sink.to_string()).increment(1);
}

/// 记录从帧时间戳到投递完成的滞后（毫秒）。
///
/// 对触发打戳的帧而言，这个值近似等于「曝光瞬间到帧离开
/// 进程」的端到端延迟。
pub fn record_dispatch_lag_ms(sink: &str, lag_ms: f64) {
    histogram!("framelock_dispatch_lag_ms", "sink" => sink.to_string()).record(lag_ms);
}

/// 上报 sink 队列当前深度。
pub fn record_sink_queue_depth(sink: &str, depth: usize) {
    gauge!("framelock_sink_queue_depth", "sink" => sink.to_string()).set(depth as f64);
}

/// 打戳结果的进程内汇总器。
///
/// 热路径之外使用：统计任务持有一个实例，对每帧调用
/// [`update`](Self::update)，结束时用 [`summary`](Self::summary)
/// 生成摘要。
#[derive(Debug, Clone, Default)]
pub struct StampMetricsAggregator {
    /// 观察到的输出帧总数
    pub total_frames: u64,
    /// 由触发脉冲打戳的帧数
    pub trigger_stamped: u64,
    /// 由本地投递时钟打戳的帧数（自由运行）
    pub clock_stamped: u64,
    /// 重新建立计数基线的帧数
    pub baseline_adoptions: u64,
    /// 触发延迟统计（毫秒）
    pub trigger_latency_ms: RunningStats,
    /// 匹配后触发队列深度统计
    pub queue_depth: RunningStats,
    /// 按相机分的帧数
    pub frames_per_camera: HashMap<String, u64>,
}

impl StampMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累积一帧的打戳元数据。
    pub fn update(&mut self, frame: &StampedFrame) {
        self.total_frames += 1;

        match frame.stamp_source {
            StampSource::Trigger => self.trigger_stamped += 1,
            StampSource::DeliveryClock => self.clock_stamped += 1,
        }

        if frame.sync_meta.adopted_baseline {
            self.baseline_adoptions += 1;
        }

        if let Some(latency) = frame.sync_meta.trigger_latency {
            self.trigger_latency_ms.push(latency * 1000.0);
        }
        self.queue_depth.push(frame.sync_meta.queue_depth as f64);

        *self
            .frames_per_camera
            .entry(frame.info.camera_id.to_string())
            .or_insert(0) += 1;
    }

    /// 生成当前的汇总快照。
    pub fn summary(&self) -> MetricsSummary {
        let sync_rate = if self.total_frames > 0 {
            self.trigger_stamped as f64 / self.total_frames as f64 * 100.0
        } else {
            0.0
        };

        MetricsSummary {
            total_frames: self.total_frames,
            trigger_stamped: self.trigger_stamped,
            clock_stamped: self.clock_stamped,
            baseline_adoptions: self.baseline_adoptions,
            sync_rate,
            trigger_latency_ms: StatsSummary::from(&self.trigger_latency_ms),
            queue_depth: StatsSummary::from(&self.queue_depth),
            frames_per_camera: self.frames_per_camera.clone(),
        }
    }

    /// 清空所有累积状态。
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 汇总快照。
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub trigger_stamped: u64,
    pub clock_stamped: u64,
    pub baseline_adoptions: u64,
    /// 触发打戳帧占比（百分数）
    pub sync_rate: f64,
    pub trigger_latency_ms: StatsSummary,
    pub queue_depth: StatsSummary,
    pub frames_per_camera: HashMap<String, u64>,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Stamp Metrics Summary ===")?;
        writeln!(f, "Total frames:        {}", self.total_frames)?;
        writeln!(
            f,
            "Trigger-stamped:     {} ({:.1}%)",
            self.trigger_stamped, self.sync_rate
        )?;
        writeln!(f, "Clock-stamped:       {}", self.clock_stamped)?;
        writeln!(f, "Baseline adoptions:  {}", self.baseline_adoptions)?;
        writeln!(f, "Trigger latency (ms): {}", self.trigger_latency_ms)?;
        writeln!(f, "Queue depth:          {}", self.queue_depth)?;
        if !self.frames_per_camera.is_empty() {
            writeln!(f, "Frames per camera:")?;
            let mut cameras: Vec<_> = self.frames_per_camera.iter().collect();
            cameras.sort_by_key(|(id, _)| id.as_str());
            for (camera_id, count) in cameras {
                writeln!(f, "  {camera_id}: {count}")?;
            }
        }
        Ok(())
    }
}

/// 单个统计量的摘要。
#[derive(Debug, Clone)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A (no samples)")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std_dev={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance accumulator (Welford's algorithm).
///
/// Constant memory regardless of sample count, numerically stable
/// for long runs.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n-1 denominator). Zero with fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.min }
    }

    pub fn max(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.max }
    }
}
