//! StampedFrame - Sync Engine output
//!
//! Timestamped frame data structure.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{CameraId, PixelFormat};

/// Origin of a frame's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampSource {
    /// Matched against a trigger packet from the external source
    Trigger,

    /// Stamped with the local delivery clock (free-run mode)
    DeliveryClock,
}

/// Timestamped frame
///
/// A complete frame whose timestamp has been resolved, either from the
/// matching trigger pulse or from the local delivery clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampedFrame {
    /// Resolved timestamp (wall-clock seconds)
    pub timestamp: f64,

    /// Output sequence number (monotonically increasing per session)
    pub seq: u64,

    /// Where the timestamp came from
    pub stamp_source: StampSource,

    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Pixel format
    pub pixel_format: PixelFormat,

    /// Raw pixel data (zero-copy)
    pub data: Bytes,

    /// Source camera info
    pub info: CameraInfo,

    /// Sync metadata
    pub sync_meta: StampMeta,
}

/// Sync metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StampMeta {
    /// Counter of the matched trigger pulse (None in free-run mode)
    pub trigger_counter: Option<u32>,

    /// Delivery latency relative to the trigger instant (seconds,
    /// None in free-run mode)
    pub trigger_latency: Option<f64>,

    /// Whether this frame re-established the counter baseline after a
    /// desync episode
    pub adopted_baseline: bool,

    /// Trigger queue depth observed after the match
    pub queue_depth: usize,
}

/// Source camera info carried with every output frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Camera ID
    pub camera_id: CameraId,

    /// Configured width
    pub width: u32,

    /// Configured height
    pub height: u32,

    /// Optional calibration resource
    pub calibration_url: Option<String>,
}
