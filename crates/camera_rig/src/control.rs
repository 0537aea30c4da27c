//! Camera device abstraction
//!
//! Defines traits for driving an industrial camera, supporting mock, replay and
//! future vendor SDK implementations behind one interface.

use std::future::Future;

use contracts::{CameraDescriptor, CameraSettings, FrameCallback, TriggerConfig};

use crate::error::Result;

/// Camera control trait
///
/// Abstracts the device operations a capture session needs. The same interface
/// covers the simulated rig, the recording replayer and a real SDK binding, so
/// everything above the device layer stays testable without hardware.
pub trait CameraControl: Send + Sync {
    /// Configured camera id (for logging and error reporting)
    fn camera_id(&self) -> &str;

    /// Open the device and apply the configured geometry
    ///
    /// Resolution, ROI offsets, pixel format and acquisition rate are fixed at
    /// construction time and take effect here, before any stream starts.
    ///
    /// # Returns
    /// Descriptor of the opened device
    fn open(&mut self) -> impl Future<Output = Result<CameraDescriptor>> + Send;

    /// Close the device
    ///
    /// Idempotent operation: returns Ok if the device is already closed.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Apply dynamic image settings
    ///
    /// Exposure, gain, black level, white balance and the on-device improve
    /// mode can be rewritten while the device is open, including mid-stream.
    fn apply_settings(
        &mut self,
        settings: &CameraSettings,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Configure the hardware trigger input
    ///
    /// Selects the trigger line, edge activation and glitch filter, and puts
    /// the sensor in external-trigger or free-run mode per `trigger.enabled`.
    fn configure_trigger(
        &mut self,
        trigger: &TriggerConfig,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Start or stop the acquisition stream
    fn set_streaming(&mut self, on: bool) -> impl Future<Output = Result<()>> + Send;

    /// Whether the acquisition stream is currently running
    fn is_streaming(&self) -> bool;

    /// Register the frame delivery callback
    ///
    /// The callback runs on the device delivery thread and must not block.
    /// Registering while a callback is attached replaces it.
    fn attach_frame_callback(&mut self, callback: FrameCallback);

    /// Remove the frame delivery callback
    ///
    /// After this returns no further frames are delivered. Must be called
    /// after `set_streaming(false)` and before `close`.
    fn detach_frame_callback(&mut self);
}
