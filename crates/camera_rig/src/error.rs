//! Camera rig error types

use contracts::ContractError;
use thiserror::Error;

/// Camera rig specific error
#[derive(Debug, Error)]
pub enum RigError {
    /// Device open error
    #[error("failed to open camera '{camera_id}': {message}")]
    DeviceOpenFailed { camera_id: String, message: String },

    /// Parameter write error
    #[error("failed to apply setting '{parameter}' on camera '{camera_id}': {message}")]
    SettingRejected {
        camera_id: String,
        parameter: String,
        message: String,
    },

    /// Stream control error
    #[error("failed to switch streaming {requested} on camera '{camera_id}': {message}")]
    StreamControlFailed {
        camera_id: String,
        requested: bool,
        message: String,
    },

    /// Trigger enable handshake error
    #[error("trigger source '{source_id}' refused enable after {attempts} attempts: {message}")]
    TriggerEnableFailed {
        source_id: String,
        attempts: u32,
        message: String,
    },

    /// Replay recording error
    #[error("failed to load recording from '{path}': {message}")]
    RecordingLoadFailed { path: String, message: String },

    /// Session command channel closed before shutdown
    #[error("session for camera '{camera_id}' is no longer accepting commands")]
    SessionClosed { camera_id: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl RigError {
    /// Create device open error
    pub fn device_open(camera_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceOpenFailed {
            camera_id: camera_id.into(),
            message: message.into(),
        }
    }

    /// Create parameter write error
    pub fn setting_rejected(
        camera_id: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SettingRejected {
            camera_id: camera_id.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create stream control error
    pub fn stream_control(
        camera_id: impl Into<String>,
        requested: bool,
        message: impl Into<String>,
    ) -> Self {
        Self::StreamControlFailed {
            camera_id: camera_id.into(),
            requested,
            message: message.into(),
        }
    }

    /// Create recording load error
    pub fn recording_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordingLoadFailed {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, RigError>;
