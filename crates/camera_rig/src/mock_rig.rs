//! Mock rig implementation
//!
//! One simulated device standing in for the camera, the pulse source and the
//! trigger switch. A background thread plays the role of the hardware: each
//! tick fires a pulse and exposes a frame, the way a wired trigger line does.
//! Used for testing and development without the physical rig.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    wall_clock, CameraDescriptor, CameraSettings, CaptureEvent, ContractError, FrameCallback,
    FrameStatus, PixelFormat, RawFrame, TriggerCallback, TriggerConfig, TriggerPacket,
    TriggerSource, TriggerSwitch,
};
use tracing::{debug, trace};

use crate::control::CameraControl;
use crate::error::{Result, RigError};

/// Mock rig configuration
#[derive(Debug, Clone)]
pub struct MockRigConfig {
    /// Pulse / frame rate (Hz)
    pub frame_rate_hz: f64,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Pixel format
    pub pixel_format: PixelFormat,
    /// Shift subtracted from emitted pulse timestamps (s). Positive values age
    /// the pulses, negative values place them in the future.
    pub trigger_time_offset: f64,
    /// Suppress the pulse callback for every Nth pulse. The hardware counter
    /// still advances, so downstream sees a counter gap.
    pub drop_pulse_every: Option<u64>,
    /// Deliver every Nth frame with an incomplete status
    pub bad_frame_every: Option<u64>,
    /// Number of leading `set_enabled` requests that fail
    pub enable_failures: u32,
    /// Fail `open` (device not found)
    pub fail_open: bool,
}

impl Default for MockRigConfig {
    fn default() -> Self {
        Self {
            frame_rate_hz: 200.0,
            width: 1280,
            height: 1024,
            pixel_format: PixelFormat::Bgr8,
            trigger_time_offset: 0.0,
            drop_pulse_every: None,
            bad_frame_every: None,
            enable_failures: 0,
            fail_open: false,
        }
    }
}

/// State shared by the camera, source and switch facades
struct RigShared {
    camera_id: String,
    source_id: String,
    config: MockRigConfig,
    /// One backing buffer for all emitted frames
    frame_data: Bytes,
    trigger_cb: Mutex<Option<TriggerCallback>>,
    frame_cb: Mutex<Option<FrameCallback>>,
    applied_settings: Mutex<Option<CameraSettings>>,
    applied_trigger: Mutex<Option<TriggerConfig>>,
    enable_requests: Mutex<Vec<bool>>,
    op_log: Mutex<Vec<String>>,
    opened: AtomicBool,
    streaming: AtomicBool,
    listening: AtomicBool,
    trigger_enabled: AtomicBool,
    emitter_running: AtomicBool,
    enable_failures_left: AtomicU32,
    pulse_counter: AtomicU32,
    pulse_index: AtomicU64,
    frame_seq: AtomicU64,
}

impl RigShared {
    fn log_op(&self, op: &str) {
        self.op_log.lock().unwrap().push(op.to_string());
    }

    /// Start the emitter thread. Idempotent: only the first caller spawns.
    fn ensure_emitter(shared: &Arc<RigShared>) {
        if shared.emitter_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let shared = shared.clone();
        let interval = Duration::from_secs_f64(1.0 / shared.config.frame_rate_hz.max(1.0));

        thread::spawn(move || {
            debug!(
                camera_id = %shared.camera_id,
                rate_hz = shared.config.frame_rate_hz,
                "mock rig emitter started"
            );

            while shared.emitter_running.load(Ordering::Relaxed) {
                shared.tick();
                thread::sleep(interval);
            }

            debug!(camera_id = %shared.camera_id, "mock rig emitter stopped");
        });
    }

    /// One hardware tick: a pulse (in trigger mode) followed by its frame
    fn tick(&self) {
        let trigger_mode = self
            .applied_trigger
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|t| t.enabled);

        if trigger_mode {
            // The sensor only exposes on trigger edges. No pulses, no frames.
            if !self.trigger_enabled.load(Ordering::Relaxed) {
                return;
            }

            let counter = self
                .pulse_counter
                .fetch_add(1, Ordering::Relaxed)
                .wrapping_add(1);
            let pulse_index = self.pulse_index.fetch_add(1, Ordering::Relaxed) + 1;
            let packet = TriggerPacket::new(
                wall_clock() - self.config.trigger_time_offset,
                counter,
            );

            let suppressed = self
                .config
                .drop_pulse_every
                .is_some_and(|n| pulse_index % n == 0);

            if suppressed {
                trace!(counter, "pulse suppressed");
            } else if self.listening.load(Ordering::Relaxed) {
                if let Some(cb) = self.trigger_cb.lock().unwrap().as_ref() {
                    cb(packet);
                }
            }

            self.deliver_frame();
        } else {
            // Free run: frames at the configured rate, no pulses involved.
            self.deliver_frame();
        }
    }

    fn deliver_frame(&self) {
        if !self.streaming.load(Ordering::Relaxed) {
            return;
        }

        let seq = self.frame_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let status = match self.config.bad_frame_every {
            Some(n) if seq % n == 0 => FrameStatus::Incomplete,
            _ => FrameStatus::Success,
        };

        let event = CaptureEvent {
            frame: RawFrame {
                hw_seq: seq,
                width: self.config.width,
                height: self.config.height,
                pixel_format: self.config.pixel_format,
                status,
                data: self.frame_data.clone(),
            },
            delivery_time: wall_clock(),
        };

        if let Some(cb) = self.frame_cb.lock().unwrap().as_ref() {
            cb(event);
        }
    }
}

/// Mock rig
///
/// Owns the shared simulated device and hands out the camera, trigger source
/// and trigger switch facades over it. Dropping the rig stops the emitter.
pub struct MockRig {
    shared: Arc<RigShared>,
}

impl MockRig {
    /// Create a new rig
    pub fn new(
        camera_id: impl Into<String>,
        source_id: impl Into<String>,
        config: MockRigConfig,
    ) -> Self {
        let frame_len =
            config.width as usize * config.height as usize * config.pixel_format.bytes_per_pixel();
        let enable_failures = config.enable_failures;

        Self {
            shared: Arc::new(RigShared {
                camera_id: camera_id.into(),
                source_id: source_id.into(),
                frame_data: Bytes::from(vec![0x80u8; frame_len]),
                config,
                trigger_cb: Mutex::new(None),
                frame_cb: Mutex::new(None),
                applied_settings: Mutex::new(None),
                applied_trigger: Mutex::new(None),
                enable_requests: Mutex::new(Vec::new()),
                op_log: Mutex::new(Vec::new()),
                opened: AtomicBool::new(false),
                streaming: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                trigger_enabled: AtomicBool::new(false),
                emitter_running: AtomicBool::new(false),
                enable_failures_left: AtomicU32::new(enable_failures),
                pulse_counter: AtomicU32::new(0),
                pulse_index: AtomicU64::new(0),
                frame_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Camera facade
    pub fn camera(&self) -> MockCamera {
        MockCamera {
            shared: self.shared.clone(),
        }
    }

    /// Pulse source facade
    pub fn trigger_source(&self) -> MockTriggerSource {
        MockTriggerSource {
            shared: self.shared.clone(),
        }
    }

    /// Trigger switch facade
    pub fn switch(&self) -> MockTriggerSwitch {
        MockTriggerSwitch {
            shared: self.shared.clone(),
        }
    }

    /// Pulses emitted so far (hardware counter value)
    pub fn pulse_count(&self) -> u32 {
        self.shared.pulse_counter.load(Ordering::Relaxed)
    }

    /// Every enable/disable request the switch has received, in order
    pub fn enable_requests(&self) -> Vec<bool> {
        self.shared.enable_requests.lock().unwrap().clone()
    }

    /// Control operations performed on the camera, in order
    pub fn operations(&self) -> Vec<String> {
        self.shared.op_log.lock().unwrap().clone()
    }

    /// Settings last written to the device
    pub fn applied_settings(&self) -> Option<CameraSettings> {
        self.shared.applied_settings.lock().unwrap().clone()
    }

    /// Stop the emitter thread
    pub fn halt(&self) {
        self.shared.emitter_running.store(false, Ordering::SeqCst);
    }
}

impl Drop for MockRig {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Mock camera, implements `CameraControl`
pub struct MockCamera {
    shared: Arc<RigShared>,
}

impl CameraControl for MockCamera {
    fn camera_id(&self) -> &str {
        &self.shared.camera_id
    }

    async fn open(&mut self) -> Result<CameraDescriptor> {
        if self.shared.config.fail_open {
            return Err(RigError::device_open(
                &self.shared.camera_id,
                "no compatible device found",
            ));
        }

        self.shared.opened.store(true, Ordering::SeqCst);
        self.shared.log_op("open");
        debug!(camera_id = %self.shared.camera_id, "mock camera opened");

        Ok(CameraDescriptor {
            model: "MockVision MV-210".to_string(),
            serial: "MV210-0001".to_string(),
            max_width: self.shared.config.width,
            max_height: self.shared.config.height,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.streaming.store(false, Ordering::SeqCst);
        self.shared.opened.store(false, Ordering::SeqCst);
        self.shared.log_op("close");
        debug!(camera_id = %self.shared.camera_id, "mock camera closed");
        Ok(())
    }

    async fn apply_settings(&mut self, settings: &CameraSettings) -> Result<()> {
        *self.shared.applied_settings.lock().unwrap() = Some(settings.clone());
        self.shared.log_op("apply_settings");
        Ok(())
    }

    async fn configure_trigger(&mut self, trigger: &TriggerConfig) -> Result<()> {
        *self.shared.applied_trigger.lock().unwrap() = Some(trigger.clone());
        self.shared.log_op("configure_trigger");
        Ok(())
    }

    async fn set_streaming(&mut self, on: bool) -> Result<()> {
        if on && !self.shared.opened.load(Ordering::SeqCst) {
            return Err(RigError::stream_control(
                &self.shared.camera_id,
                on,
                "device is not open",
            ));
        }

        self.shared.streaming.store(on, Ordering::SeqCst);
        self.shared
            .log_op(if on { "stream_on" } else { "stream_off" });

        if on {
            RigShared::ensure_emitter(&self.shared);
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::Relaxed)
    }

    fn attach_frame_callback(&mut self, callback: FrameCallback) {
        *self.shared.frame_cb.lock().unwrap() = Some(callback);
        self.shared.log_op("attach_callback");
    }

    fn detach_frame_callback(&mut self) {
        *self.shared.frame_cb.lock().unwrap() = None;
        self.shared.log_op("detach_callback");
    }
}

/// Mock pulse source, implements `TriggerSource`
pub struct MockTriggerSource {
    shared: Arc<RigShared>,
}

impl TriggerSource for MockTriggerSource {
    fn source_id(&self) -> &str {
        &self.shared.source_id
    }

    fn listen(&self, callback: TriggerCallback) {
        // Idempotent: if already listening, don't start again
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.shared.trigger_cb.lock().unwrap() = Some(callback);
        RigShared::ensure_emitter(&self.shared);
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Relaxed)
    }
}

/// Mock trigger switch, implements `TriggerSwitch`
pub struct MockTriggerSwitch {
    shared: Arc<RigShared>,
}

impl TriggerSwitch for MockTriggerSwitch {
    fn target(&self) -> &str {
        &self.shared.source_id
    }

    async fn set_enabled(&self, enabled: bool) -> std::result::Result<(), ContractError> {
        self.shared.enable_requests.lock().unwrap().push(enabled);

        let inject_failure = self
            .shared
            .enable_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject_failure {
            return Err(ContractError::trigger_request(
                &self.shared.source_id,
                "enable service unavailable",
            ));
        }

        self.shared.trigger_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.shared.trigger_enabled.load(Ordering::Relaxed)
    }
}
