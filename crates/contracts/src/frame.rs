//! 帧事件 - 采集输出
//!
//! 相机回调产生的原始帧结构。

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 帧完成状态
///
/// 由相机驱动在传输结束时判定。只有 `Success` 的帧才会进入同步流程。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    /// 完整帧
    Success,

    /// 传输不完整 (丢包/截断)
    Incomplete,

    /// 帧头信息无效
    InvalidInfo,
}

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Mono8,
    BayerRg8,
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    /// 每像素字节数
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Mono8 | PixelFormat::BayerRg8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// 原始帧
///
/// 从相机回调接收的未定时数据。`hw_seq` 是相机自身的帧计数器,
/// 仅用于诊断, 不参与触发配对。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrame {
    /// 相机硬件帧序号
    pub hw_seq: u64,

    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub pixel_format: PixelFormat,

    /// 传输状态
    pub status: FrameStatus,

    /// 原始像素数据 (零拷贝)
    pub data: Bytes,
}

impl RawFrame {
    /// 按宽高和格式计算的期望字节数
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }
}

/// 帧到达事件
///
/// `delivery_time` 是帧进入本进程时的本地挂钟时间 (秒),
/// 在相机回调入口处打点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureEvent {
    /// 原始帧
    pub frame: RawFrame,

    /// 本地到达时间 (UNIX 秒)
    pub delivery_time: f64,
}

/// 帧事件回调类型
pub type FrameCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// 相机描述符
///
/// 打开设备后探测到的只读信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// 型号名称
    pub model: String,

    /// 序列号
    pub serial: String,

    /// 传感器最大宽度
    pub max_width: u32,

    /// 传感器最大高度
    pub max_height: u32,
}
