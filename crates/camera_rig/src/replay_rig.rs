//! Replay rig - drives capture from a recorded session
//!
//! Reads a JSONL capture log recorded against the real rig and replays
//! trigger pulses and frame deliveries on their original timeline. Pulse
//! timestamps are rebased onto the current clock so latency checks behave
//! as they did live.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    wall_clock, CameraDescriptor, CameraSettings, CaptureEvent, ContractError, FrameCallback,
    FrameStatus, PixelFormat, RawFrame, TriggerCallback, TriggerConfig, TriggerPacket,
    TriggerSource, TriggerSwitch,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::control::CameraControl;
use crate::error::{Result, RigError};

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayRigConfig {
    /// Playback speed multiplier (1.0 = original speed)
    pub speed_multiplier: f64,
    /// Restart from the beginning when the log is exhausted
    pub loop_playback: bool,
}

impl Default for ReplayRigConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            loop_playback: false,
        }
    }
}

/// One line of the capture log
#[derive(Debug, Clone, Deserialize)]
struct CaptureRecord {
    /// Record kind: "pulse" or "frame"
    record: String,
    /// Offset from recording start (s)
    at: f64,

    // Pulse fields
    #[serde(default)]
    trigger_counter: Option<u32>,

    // Frame fields
    #[serde(default)]
    hw_seq: Option<u64>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    pixel_format: Option<PixelFormat>,
    #[serde(default)]
    status: Option<FrameStatus>,
    #[serde(default)]
    data_file: Option<String>,
}

/// State shared by the replay facades
struct ReplayShared {
    camera_id: String,
    source_id: String,
    recording_path: PathBuf,
    records: Vec<CaptureRecord>,
    config: ReplayRigConfig,
    trigger_cb: Mutex<Option<TriggerCallback>>,
    frame_cb: Mutex<Option<FrameCallback>>,
    opened: AtomicBool,
    streaming: AtomicBool,
    listening: AtomicBool,
    trigger_enabled: AtomicBool,
    playing: AtomicBool,
    player: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayShared {
    /// Start the playback thread. Idempotent: only the first caller spawns.
    fn ensure_player(shared: &Arc<ReplayShared>) {
        if shared.playing.swap(true, Ordering::SeqCst) {
            return;
        }

        let worker = shared.clone();
        let handle = thread::spawn(move || worker.play());
        *shared.player.lock().unwrap() = Some(handle);
    }

    fn play(&self) {
        debug!(camera_id = %self.camera_id, "replay thread started");
        let speed = self.config.speed_multiplier.max(0.1);

        loop {
            if self.records.is_empty() {
                warn!(camera_id = %self.camera_id, "no records to replay");
                break;
            }

            let start = Instant::now();
            let epoch = wall_clock();
            let base = self.records[0].at;

            for record in &self.records {
                if !self.playing.load(Ordering::Relaxed) {
                    debug!(camera_id = %self.camera_id, "replay stopped");
                    return;
                }

                let offset = (record.at - base) / speed;
                let target_elapsed = Duration::from_secs_f64(offset);
                let actual_elapsed = start.elapsed();
                if target_elapsed > actual_elapsed {
                    thread::sleep(target_elapsed - actual_elapsed);
                }

                match record.record.as_str() {
                    "pulse" => self.play_pulse(record, epoch + offset),
                    "frame" => self.play_frame(record),
                    other => warn!(kind = other, "unknown record kind, skipping"),
                }
            }

            if !self.config.loop_playback {
                info!(camera_id = %self.camera_id, "replay completed");
                break;
            }

            debug!(camera_id = %self.camera_id, "looping replay");
        }

        self.playing.store(false, Ordering::SeqCst);
    }

    fn play_pulse(&self, record: &CaptureRecord, trigger_time: f64) {
        if !self.listening.load(Ordering::Relaxed) || !self.trigger_enabled.load(Ordering::Relaxed)
        {
            return;
        }
        let Some(counter) = record.trigger_counter else {
            warn!(at = record.at, "pulse record without counter, skipping");
            return;
        };

        if let Some(cb) = self.trigger_cb.lock().unwrap().as_ref() {
            cb(TriggerPacket::new(trigger_time, counter));
        }
    }

    fn play_frame(&self, record: &CaptureRecord) {
        if !self.streaming.load(Ordering::Relaxed) {
            return;
        }

        let frame = RawFrame {
            hw_seq: record.hw_seq.unwrap_or(0),
            width: record.width.unwrap_or(0),
            height: record.height.unwrap_or(0),
            pixel_format: record.pixel_format.unwrap_or(PixelFormat::Bgr8),
            status: record.status.unwrap_or(FrameStatus::Success),
            data: Bytes::new(),
        };
        let data = match &record.data_file {
            Some(rel) => self.read_frame_data(rel, frame.expected_len()),
            // Logs recorded without image payloads replay as zero frames
            None => Bytes::from(vec![0u8; frame.expected_len()]),
        };

        let event = CaptureEvent {
            frame: RawFrame { data, ..frame },
            delivery_time: wall_clock(),
        };

        if let Some(cb) = self.frame_cb.lock().unwrap().as_ref() {
            cb(event);
        }
    }

    fn read_frame_data(&self, relative_path: &str, expected_len: usize) -> Bytes {
        let path = self.recording_path.join(relative_path);
        match std::fs::read(&path) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read frame payload");
                Bytes::from(vec![0u8; expected_len])
            }
        }
    }
}

/// Replay rig
///
/// Owns the recorded timeline and hands out camera, trigger source and
/// trigger switch facades over it, mirroring the mock rig surface.
pub struct ReplayRig {
    shared: Arc<ReplayShared>,
}

impl std::fmt::Debug for ReplayRig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayRig")
            .field("camera_id", &self.shared.camera_id)
            .field("source_id", &self.shared.source_id)
            .field("recording_path", &self.shared.recording_path)
            .finish_non_exhaustive()
    }
}

impl ReplayRig {
    /// Load a capture log from a recording directory
    ///
    /// Expects `capture.jsonl` in the directory, one record per line.
    /// Records are sorted by their `at` offset after loading.
    pub fn load(
        recording_path: &Path,
        camera_id: impl Into<String>,
        source_id: impl Into<String>,
        config: ReplayRigConfig,
    ) -> Result<Self> {
        let camera_id = camera_id.into();
        let log_path = recording_path.join("capture.jsonl");
        let file = File::open(&log_path)
            .map_err(|e| RigError::recording_load(log_path.display().to_string(), e.to_string()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| {
                RigError::recording_load(log_path.display().to_string(), e.to_string())
            })?;
            if line.is_empty() {
                continue;
            }

            let record: CaptureRecord = serde_json::from_str(&line).map_err(|e| {
                RigError::recording_load(log_path.display().to_string(), e.to_string())
            })?;
            records.push(record);
        }

        records.sort_by(|a, b| a.at.total_cmp(&b.at));

        info!(
            camera_id = %camera_id,
            records = records.len(),
            path = %recording_path.display(),
            "loaded capture recording"
        );

        Ok(Self {
            shared: Arc::new(ReplayShared {
                camera_id,
                source_id: source_id.into(),
                recording_path: recording_path.to_path_buf(),
                records,
                config,
                trigger_cb: Mutex::new(None),
                frame_cb: Mutex::new(None),
                opened: AtomicBool::new(false),
                streaming: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                // The log was recorded against a live source, so the switch
                // starts enabled and an enable handshake is a no-op.
                trigger_enabled: AtomicBool::new(true),
                playing: AtomicBool::new(false),
                player: Mutex::new(None),
            }),
        })
    }

    /// Camera facade
    pub fn camera(&self) -> ReplayCamera {
        ReplayCamera {
            shared: self.shared.clone(),
        }
    }

    /// Pulse source facade
    pub fn trigger_source(&self) -> ReplayTriggerSource {
        ReplayTriggerSource {
            shared: self.shared.clone(),
        }
    }

    /// Trigger switch facade
    pub fn switch(&self) -> ReplayTriggerSwitch {
        ReplayTriggerSwitch {
            shared: self.shared.clone(),
        }
    }

    /// Number of loaded records
    pub fn record_count(&self) -> usize {
        self.shared.records.len()
    }

    /// Whether the playback thread is still running
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// Stop playback and wait for the thread to finish
    pub fn halt(&self) {
        self.shared.playing.store(false, Ordering::SeqCst);
        if let Some(handle) = self.shared.player.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReplayRig {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Replay camera, implements `CameraControl`
pub struct ReplayCamera {
    shared: Arc<ReplayShared>,
}

impl CameraControl for ReplayCamera {
    fn camera_id(&self) -> &str {
        &self.shared.camera_id
    }

    async fn open(&mut self) -> Result<CameraDescriptor> {
        self.shared.opened.store(true, Ordering::SeqCst);

        // Geometry comes from the first frame record in the log
        let first_frame = self
            .shared
            .records
            .iter()
            .find(|r| r.record == "frame");

        Ok(CameraDescriptor {
            model: "Recorded capture".to_string(),
            serial: self
                .shared
                .recording_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "replay".to_string()),
            max_width: first_frame.and_then(|r| r.width).unwrap_or(0),
            max_height: first_frame.and_then(|r| r.height).unwrap_or(0),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.streaming.store(false, Ordering::SeqCst);
        self.shared.opened.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_settings(&mut self, _settings: &CameraSettings) -> Result<()> {
        // Image settings were baked in at recording time
        Ok(())
    }

    async fn configure_trigger(&mut self, _trigger: &TriggerConfig) -> Result<()> {
        Ok(())
    }

    async fn set_streaming(&mut self, on: bool) -> Result<()> {
        if on && !self.shared.opened.load(Ordering::SeqCst) {
            return Err(RigError::stream_control(
                &self.shared.camera_id,
                on,
                "recording is not open",
            ));
        }

        self.shared.streaming.store(on, Ordering::SeqCst);
        if on {
            ReplayShared::ensure_player(&self.shared);
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::Relaxed)
    }

    fn attach_frame_callback(&mut self, callback: FrameCallback) {
        *self.shared.frame_cb.lock().unwrap() = Some(callback);
    }

    fn detach_frame_callback(&mut self) {
        *self.shared.frame_cb.lock().unwrap() = None;
    }
}

/// Replay pulse source, implements `TriggerSource`
///
/// Registration only wires the callback. Playback begins when the camera
/// stream starts, so the head of the log is never lost to setup ordering.
pub struct ReplayTriggerSource {
    shared: Arc<ReplayShared>,
}

impl TriggerSource for ReplayTriggerSource {
    fn source_id(&self) -> &str {
        &self.shared.source_id
    }

    fn listen(&self, callback: TriggerCallback) {
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.shared.trigger_cb.lock().unwrap() = Some(callback);
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Relaxed)
    }
}

/// Replay trigger switch, implements `TriggerSwitch`
///
/// Requests always succeed; a disabled switch suppresses pulse records while
/// frames keep playing, approximating a live source that was turned off.
pub struct ReplayTriggerSwitch {
    shared: Arc<ReplayShared>,
}

impl TriggerSwitch for ReplayTriggerSwitch {
    fn target(&self) -> &str {
        &self.shared.source_id
    }

    async fn set_enabled(&self, enabled: bool) -> std::result::Result<(), ContractError> {
        self.shared.trigger_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.shared.trigger_enabled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_recording(lines: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("capture.jsonl")).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        dir
    }

    fn sample_recording() -> tempfile::TempDir {
        write_recording(&[
            r#"{"record":"pulse","at":0.0,"trigger_counter":7}"#,
            r#"{"record":"frame","at":0.002,"hw_seq":1,"width":4,"height":4,"pixel_format":"bgr8","status":"success"}"#,
            r#"{"record":"pulse","at":0.005,"trigger_counter":8}"#,
            r#"{"record":"frame","at":0.007,"hw_seq":2,"width":4,"height":4,"pixel_format":"bgr8","status":"success"}"#,
        ])
    }

    #[test]
    fn test_load_missing_log_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReplayRig::load(dir.path(), "cam", "imu", ReplayRigConfig::default())
            .unwrap_err();
        assert!(matches!(err, RigError::RecordingLoadFailed { .. }));
    }

    #[test]
    fn test_load_sorts_shuffled_records() {
        let dir = write_recording(&[
            r#"{"record":"pulse","at":0.005,"trigger_counter":8}"#,
            r#"{"record":"pulse","at":0.0,"trigger_counter":7}"#,
        ]);
        let rig = ReplayRig::load(dir.path(), "cam", "imu", ReplayRigConfig::default()).unwrap();
        assert_eq!(rig.record_count(), 2);
        assert_eq!(rig.shared.records[0].trigger_counter, Some(7));
    }

    #[tokio::test]
    async fn test_replay_delivers_pulses_and_frames() {
        let dir = sample_recording();
        let rig = ReplayRig::load(
            dir.path(),
            "cam",
            "imu",
            ReplayRigConfig {
                speed_multiplier: 10.0,
                loop_playback: false,
            },
        )
        .unwrap();

        let counters: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let seqs: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

        let counters_cb = counters.clone();
        rig.trigger_source().listen(Arc::new(move |packet| {
            counters_cb.lock().unwrap().push(packet.trigger_counter);
        }));
        rig.switch().set_enabled(true).await.unwrap();

        let mut camera = rig.camera();
        let descriptor = camera.open().await.unwrap();
        assert_eq!(descriptor.max_width, 4);

        let seqs_cb = seqs.clone();
        camera.attach_frame_callback(Arc::new(move |event| {
            assert_eq!(event.frame.data.len(), event.frame.expected_len());
            seqs_cb.lock().unwrap().push(event.frame.hw_seq);
        }));
        camera.set_streaming(true).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        rig.halt();

        assert_eq!(*counters.lock().unwrap(), vec![7, 8]);
        assert_eq!(*seqs.lock().unwrap(), vec![1, 2]);
        assert!(!rig.is_playing());
    }

    #[tokio::test]
    async fn test_disabled_switch_suppresses_pulses() {
        let dir = sample_recording();
        let rig = ReplayRig::load(
            dir.path(),
            "cam",
            "imu",
            ReplayRigConfig {
                speed_multiplier: 10.0,
                loop_playback: false,
            },
        )
        .unwrap();

        let counters: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let counters_cb = counters.clone();
        rig.trigger_source().listen(Arc::new(move |packet| {
            counters_cb.lock().unwrap().push(packet.trigger_counter);
        }));
        rig.switch().set_enabled(false).await.unwrap();

        let mut camera = rig.camera();
        camera.open().await.unwrap();
        camera.attach_frame_callback(Arc::new(|_| {}));
        camera.set_streaming(true).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        rig.halt();

        assert!(counters.lock().unwrap().is_empty());
    }
}
