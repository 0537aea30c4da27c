//! RigBlueprint - Config Loader 输出
//!
//! 描述完整的采集配置：相机、外部触发、同步参数、输出路由。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{PixelFormat, SyncTuning};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RigBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 相机配置
    #[validate(nested)]
    pub camera: CameraConfig,

    /// 外部触发配置
    #[serde(default)]
    #[validate(nested)]
    pub trigger: TriggerConfig,

    /// 同步参数
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncTuningConfig,

    /// 输出路由配置
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,
}

impl RigBlueprint {
    /// 由蓝图 sync 段生成运行时同步参数
    pub fn to_sync_tuning(&self) -> SyncTuning {
        self.sync.to_tuning()
    }
}

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    /// 唯一标识符
    #[validate(length(min = 1))]
    pub id: String,

    /// 序列号 (连接多台设备时必填, 留空则打开第一台)
    #[serde(default)]
    pub serial: Option<String>,

    /// 标定文件地址 (可选)
    #[serde(default)]
    pub calibration_url: Option<String>,

    /// 图像宽度
    #[serde(default = "default_width")]
    #[validate(range(min = 1))]
    pub width: u32,

    /// 图像高度
    #[serde(default = "default_height")]
    #[validate(range(min = 1))]
    pub height: u32,

    /// ROI 水平偏移
    #[serde(default)]
    pub offset_x: u32,

    /// ROI 垂直偏移
    #[serde(default)]
    pub offset_y: u32,

    /// 像素格式
    #[serde(default = "default_pixel_format")]
    pub pixel_format: PixelFormat,

    /// 自由采集帧率 (Hz)；触发模式下实际帧率由触发源决定
    #[serde(default = "default_frame_rate")]
    #[validate(range(exclusive_min = 0.0, max = 1000.0))]
    pub frame_rate_hz: f64,

    /// 采集参数
    #[serde(default)]
    #[validate(nested)]
    pub settings: CameraSettings,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    1024
}

fn default_pixel_format() -> PixelFormat {
    PixelFormat::Bgr8
}

fn default_frame_rate() -> f64 {
    210.0
}

/// 采集参数
///
/// 自动/手动成对出现：auto 为 true 时对应的手动值被忽略。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraSettings {
    /// 自动曝光
    #[serde(default = "default_true")]
    pub exposure_auto: bool,

    /// 手动曝光时间 (微秒)
    #[serde(default = "default_exposure_us")]
    #[validate(range(min = 1.0, max = 1_000_000.0))]
    pub exposure_us: f64,

    /// 自动增益
    #[serde(default = "default_true")]
    pub gain_auto: bool,

    /// 手动增益 (dB)
    #[serde(default)]
    pub gain_db: f64,

    /// 自动黑电平
    #[serde(default = "default_true")]
    pub black_level_auto: bool,

    /// 手动黑电平
    #[serde(default)]
    pub black_level: f64,

    /// 自动白平衡
    #[serde(default = "default_true")]
    pub white_balance_auto: bool,

    /// 手动白平衡通道
    #[serde(default)]
    pub white_balance_channel: WhiteBalanceChannel,

    /// 手动白平衡增益比
    #[serde(default = "default_balance_ratio")]
    pub white_balance_ratio: f64,

    /// 图像增强模式
    #[serde(default)]
    pub improve_mode: ImproveMode,
}

fn default_true() -> bool {
    true
}

fn default_exposure_us() -> f64 {
    2000.0
}

fn default_balance_ratio() -> f64 {
    1.0
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_auto: true,
            exposure_us: default_exposure_us(),
            gain_auto: true,
            gain_db: 0.0,
            black_level_auto: true,
            black_level: 0.0,
            white_balance_auto: true,
            white_balance_channel: WhiteBalanceChannel::default(),
            white_balance_ratio: default_balance_ratio(),
            improve_mode: ImproveMode::default(),
        }
    }
}

/// 白平衡通道 (手动模式下选择要调整的增益比)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteBalanceChannel {
    #[default]
    Red,
    Green,
    Blue,
}

/// 图像增强模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImproveMode {
    /// 对比度 + 伽马
    ContrastGamma,
    /// 仅伽马
    #[default]
    Gamma,
    /// 仅对比度
    Contrast,
    /// 关闭
    Off,
}

/// 外部触发配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TriggerConfig {
    /// 启用外部触发 (false 时相机自由采集, 帧用到达时间打戳)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 触发源标识 (IMU 名称)
    #[serde(default = "default_trigger_source")]
    #[validate(length(min = 1))]
    pub source_id: String,

    /// 硬件触发线
    #[serde(default)]
    pub line: TriggerLine,

    /// 触发沿
    #[serde(default)]
    pub activation: TriggerActivation,

    /// 上升沿滤波 (微秒)
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub rising_filter_us: f64,
}

fn default_trigger_source() -> String {
    "gimbal_imu".to_string()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_id: default_trigger_source(),
            line: TriggerLine::default(),
            activation: TriggerActivation::default(),
            rising_filter_us: 0.0,
        }
    }
}

/// 硬件触发线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerLine {
    Line0,
    Line1,
    Line2,
    #[default]
    Line3,
    /// 软件触发 (调试用)
    Software,
}

/// 触发沿
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerActivation {
    #[default]
    RisingEdge,
    FallingEdge,
}

/// 同步参数 (毫秒为单位的原始配置)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncTuningConfig {
    /// 触发队列槽位数 (其中一个槽用于区分满/空, 可用容量为 N-1)
    #[serde(default = "default_queue_slots")]
    #[validate(range(min = 2, max = 65536))]
    pub queue_slots: usize,

    /// 触发到帧的最大容忍延迟 (毫秒)
    #[serde(default = "default_max_latency_ms")]
    #[validate(range(exclusive_min = 0.0))]
    pub max_trigger_latency_ms: f64,

    /// 帧等待配对触发包的超时 (毫秒)
    #[serde(default = "default_wait_timeout_ms")]
    #[validate(range(exclusive_min = 0.0))]
    pub trigger_wait_timeout_ms: f64,

    /// 重同步监督器周期 (毫秒)
    #[serde(default = "default_resync_interval_ms")]
    #[validate(range(min = 1))]
    pub resync_interval_ms: u64,

    /// 触发静默判定阈值 (毫秒)
    #[serde(default = "default_stale_after_ms")]
    #[validate(range(min = 1))]
    pub trigger_stale_after_ms: u64,

    /// 启动阶段使能请求的最大尝试次数
    #[serde(default = "default_startup_attempts")]
    #[validate(range(min = 1))]
    pub startup_enable_attempts: u32,

    /// 输出帧通道容量
    #[serde(default = "default_frame_channel_capacity")]
    #[validate(range(min = 1))]
    pub frame_channel_capacity: usize,
}

fn default_queue_slots() -> usize {
    1023
}

fn default_max_latency_ms() -> f64 {
    60.0
}

fn default_wait_timeout_ms() -> f64 {
    25.0
}

fn default_resync_interval_ms() -> u64 {
    500
}

fn default_stale_after_ms() -> u64 {
    1000
}

fn default_startup_attempts() -> u32 {
    20
}

fn default_frame_channel_capacity() -> usize {
    32
}

impl Default for SyncTuningConfig {
    fn default() -> Self {
        Self {
            queue_slots: default_queue_slots(),
            max_trigger_latency_ms: default_max_latency_ms(),
            trigger_wait_timeout_ms: default_wait_timeout_ms(),
            resync_interval_ms: default_resync_interval_ms(),
            trigger_stale_after_ms: default_stale_after_ms(),
            startup_enable_attempts: default_startup_attempts(),
            frame_channel_capacity: default_frame_channel_capacity(),
        }
    }
}

impl SyncTuningConfig {
    /// 转换为运行时同步参数
    pub fn to_tuning(&self) -> SyncTuning {
        SyncTuning {
            queue_slots: self.queue_slots,
            max_trigger_latency: std::time::Duration::from_secs_f64(
                self.max_trigger_latency_ms / 1000.0,
            ),
            trigger_wait_timeout: std::time::Duration::from_secs_f64(
                self.trigger_wait_timeout_ms / 1000.0,
            ),
            resync_interval: std::time::Duration::from_millis(self.resync_interval_ms),
            trigger_stale_after: std::time::Duration::from_millis(self.trigger_stale_after_ms),
            startup_enable_attempts: self.startup_enable_attempts,
            frame_channel_capacity: self.frame_channel_capacity,
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    Network,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sample_blueprint() -> RigBlueprint {
        RigBlueprint {
            version: ConfigVersion::V1,
            camera: CameraConfig {
                id: "cam_main".into(),
                serial: Some("KE0200080100".into()),
                calibration_url: None,
                width: 1280,
                height: 1024,
                offset_x: 0,
                offset_y: 0,
                pixel_format: PixelFormat::Bgr8,
                frame_rate_hz: 210.0,
                settings: CameraSettings::default(),
            },
            trigger: TriggerConfig::default(),
            sync: SyncTuningConfig::default(),
            sinks: vec![],
        }
    }

    #[test]
    fn sync_tuning_conversion() {
        let blueprint = sample_blueprint();
        let tuning = blueprint.to_sync_tuning();
        assert_eq!(tuning.queue_slots, 1023);
        assert_eq!(tuning.usable_slots(), 1022);
        assert_eq!(tuning.max_trigger_latency, Duration::from_millis(60));
        assert_eq!(tuning.trigger_wait_timeout, Duration::from_millis(25));
        assert_eq!(tuning.resync_interval, Duration::from_millis(500));
        assert_eq!(tuning.trigger_stale_after, Duration::from_secs(1));
    }

    #[test]
    fn minimal_json_applies_defaults() {
        let json = r#"{ "camera": { "id": "cam_main" } }"#;
        let blueprint: RigBlueprint = serde_json::from_str(json).unwrap();
        assert_eq!(blueprint.camera.width, 1280);
        assert_eq!(blueprint.camera.height, 1024);
        assert_eq!(blueprint.camera.pixel_format, PixelFormat::Bgr8);
        assert_eq!(blueprint.camera.frame_rate_hz, 210.0);
        assert!(blueprint.camera.settings.exposure_auto);
        assert_eq!(blueprint.camera.settings.exposure_us, 2000.0);
        assert!(blueprint.trigger.enabled);
        assert_eq!(blueprint.trigger.source_id, "gimbal_imu");
        assert_eq!(blueprint.trigger.line, TriggerLine::Line3);
        assert_eq!(blueprint.trigger.activation, TriggerActivation::RisingEdge);
        assert_eq!(blueprint.sync.queue_slots, 1023);
        assert!(blueprint.sinks.is_empty());
    }

    #[test]
    fn validate_rejects_bad_ranges() {
        let mut blueprint = sample_blueprint();
        blueprint.camera.width = 0;
        assert!(blueprint.validate().is_err());

        let mut blueprint = sample_blueprint();
        blueprint.sync.queue_slots = 1;
        assert!(blueprint.validate().is_err());

        let mut blueprint = sample_blueprint();
        blueprint.trigger.source_id = String::new();
        assert!(blueprint.validate().is_err());
    }

    #[test]
    fn validate_accepts_sample() {
        let blueprint = sample_blueprint();
        assert!(blueprint.validate().is_ok());
    }
}
