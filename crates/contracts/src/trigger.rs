//! Trigger source abstraction
//!
//! Defines a unified interface for external trigger sources, decoupling the
//! synchronization engine from concrete hardware implementations.
//! Supports unified handling of real IMU trigger lines and Mock sources.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ContractError;

/// Timing record of a single hardware trigger pulse.
///
/// Produced whenever the external source fires a camera trigger. Both fields
/// come from the trigger side; nothing here is observed by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerPacket {
    /// Trigger instant in wall-clock seconds since the UNIX epoch,
    /// as measured by the trigger source.
    pub trigger_time: f64,
    /// Monotonically increasing pulse counter. Wraps around at `u32::MAX`.
    pub trigger_counter: u32,
}

impl TriggerPacket {
    pub fn new(trigger_time: f64, trigger_counter: u32) -> Self {
        Self {
            trigger_time,
            trigger_counter,
        }
    }

    /// Counter of the pulse that follows this one, with wraparound.
    pub fn next_counter(&self) -> u32 {
        self.trigger_counter.wrapping_add(1)
    }
}

/// Trigger packet callback type
///
/// When the source fires a pulse, it sends `TriggerPacket` through this
/// callback. Uses `Arc` to allow callback sharing across multiple contexts.
pub type TriggerCallback = Arc<dyn Fn(TriggerPacket) + Send + Sync>;

/// Trigger source trait
///
/// Abstracts the common behavior of real IMU trigger lines and Mock sources.
/// The callback is invoked from the source's own delivery context, so it must
/// stay cheap and must never block.
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn TriggerSource> = get_trigger_source();
/// source.listen(Arc::new(|packet| {
///     println!("pulse #{}", packet.trigger_counter);
/// }));
/// // ... use source ...
/// source.stop();
/// ```
pub trait TriggerSource: Send + Sync {
    /// Get trigger source ID
    fn source_id(&self) -> &str;

    /// Register pulse callback
    ///
    /// When the source fires a pulse, it calls the callback function with a
    /// `TriggerPacket`. If already listening, repeated calls should be
    /// idempotent (won't register multiple callbacks).
    fn listen(&self, callback: TriggerCallback);

    /// Stop listening
    ///
    /// Stops pulse delivery. For Mock sources, stops the background thread;
    /// for real sources, tears down the hardware subscription.
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}

/// Trigger switch trait
///
/// Remote control surface of the trigger source: asks the external device to
/// start or stop firing pulses. Requests are asynchronous and may fail; the
/// device confirms the new state by actually delivering (or ceasing to
/// deliver) pulses.
pub trait TriggerSwitch: Send + Sync {
    /// Identifier of the controlled source (for logging and tracing)
    fn target(&self) -> &str;

    /// Request the source to enable or disable pulse generation
    ///
    /// Idempotent on the device side: enabling an already enabled source is
    /// not an error.
    fn set_enabled(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), ContractError>> + Send;

    /// Last state this switch successfully requested
    fn is_enabled(&self) -> bool;
}
