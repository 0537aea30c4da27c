//! Shared error type for everything that crosses a crate boundary.
//!
//! Variants are grouped by where the failure originates: blueprint
//! loading, the camera device, the trigger source, and the output sinks.

use thiserror::Error;

/// Cross-crate error
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Blueprint =====
    /// File could not be deserialized
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parsed fine but the values are unusable
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Camera =====
    /// Open/configure failed; fatal to the owning session
    #[error("device init error for '{camera_id}': {message}")]
    DeviceInit { camera_id: String, message: String },

    /// Runtime device command failed
    #[error("device control error for '{camera_id}': {message}")]
    DeviceControl { camera_id: String, message: String },

    /// Requested camera is not attached
    #[error("camera not found: {camera_id}")]
    CameraNotFound { camera_id: String },

    // ===== Trigger source =====
    /// Enable/disable handshake failed
    #[error("trigger request to '{source_id}' failed: {message}")]
    TriggerRequest { source_id: String, message: String },

    // ===== Sinks =====
    /// Write into a sink failed
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink endpoint could not be reached
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General =====
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Escape hatch for one-off failures
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Shorthand constructor
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn device_init(camera_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceInit {
            camera_id: camera_id.into(),
            message: message.into(),
        }
    }

    pub fn device_control(camera_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceControl {
            camera_id: camera_id.into(),
            message: message.into(),
        }
    }

    pub fn trigger_request(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TriggerRequest {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
