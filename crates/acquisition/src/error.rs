//! Acquisition 错误类型

use thiserror::Error;

/// Acquisition 错误
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// 下游通道在帧仍在流动时关闭
    #[error("downstream channel closed at stage '{stage}'")]
    ChannelClosed {
        /// 所处管线阶段
        stage: String,
    },

    /// 帧通道接收端已被取走
    #[error("frame receiver for camera '{camera_id}' was already taken")]
    ReceiverTaken {
        /// 相机 ID
        camera_id: String,
    },
}

/// Acquisition Result 类型别名
pub type Result<T> = std::result::Result<T, AcquisitionError>;
