//! Pipeline orchestrator - coordinates all components.
//!
//! Builds the capture chain from a blueprint: camera session, trigger
//! bridge, frame correlator and sink dispatcher. Drives the simulated
//! rig by default, or replays a recorded capture log.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use acquisition::{AcquisitionPipeline, BackpressureConfig};
use camera_rig::{
    CameraControl, CameraSession, MockRig, MockRigConfig, ReplayRig, ReplayRigConfig,
};
use contracts::{CameraId, CameraInfo, RigBlueprint, TriggerSource, TriggerSwitch};
use dispatcher::create_dispatcher;
use sync_engine::{FrameCorrelator, ResyncSupervisor, SyncMonitor, TriggerQueue};

use super::stats::PipelineStats;

/// Pipeline configuration
pub struct PipelineConfig {
    /// Rig blueprint
    pub blueprint: RigBlueprint,

    /// Maximum frames to stamp (None = unlimited)
    pub max_frames: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Recorded capture log to replay instead of the live rig
    pub replay_path: Option<PathBuf>,

    /// Replay speed multiplier
    pub replay_speed: f64,

    /// Restart replay when the log is exhausted
    pub replay_loop: bool,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline from configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the frame limit, timeout or shutdown flag
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<PipelineStats> {
        let start_time = Instant::now();

        // Start metrics server if configured
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!(port, "Metrics server started");
        }

        match self.config.replay_path.clone() {
            Some(path) => self.run_replay(path, shutdown, start_time).await,
            None => self.run_mock(shutdown, start_time).await,
        }
    }

    /// Run against the simulated rig
    async fn run_mock(
        self,
        shutdown: watch::Receiver<bool>,
        start_time: Instant,
    ) -> Result<PipelineStats> {
        let camera = &self.config.blueprint.camera;
        let rig = MockRig::new(
            camera.id.as_str(),
            self.config.blueprint.trigger.source_id.as_str(),
            MockRigConfig {
                frame_rate_hz: camera.frame_rate_hz,
                width: camera.width,
                height: camera.height,
                pixel_format: camera.pixel_format,
                ..MockRigConfig::default()
            },
        );

        info!(
            camera_id = %camera.id,
            rate_hz = camera.frame_rate_hz,
            "Running in MOCK mode (simulated camera and trigger source)"
        );

        let stats = self
            .run_capture(
                rig.camera(),
                Box::new(rig.trigger_source()),
                Arc::new(rig.switch()),
                shutdown,
                start_time,
            )
            .await;
        rig.halt();
        stats
    }

    /// Replay a recorded capture log
    async fn run_replay(
        self,
        path: PathBuf,
        shutdown: watch::Receiver<bool>,
        start_time: Instant,
    ) -> Result<PipelineStats> {
        let camera = &self.config.blueprint.camera;
        let rig = ReplayRig::load(
            &path,
            camera.id.as_str(),
            self.config.blueprint.trigger.source_id.as_str(),
            ReplayRigConfig {
                speed_multiplier: self.config.replay_speed,
                loop_playback: self.config.replay_loop,
            },
        )
        .with_context(|| format!("Failed to load capture log from {}", path.display()))?;

        info!(
            records = rig.record_count(),
            speed = self.config.replay_speed,
            looped = self.config.replay_loop,
            "Running in REPLAY mode"
        );

        let stats = self
            .run_capture(
                rig.camera(),
                Box::new(rig.trigger_source()),
                Arc::new(rig.switch()),
                shutdown,
                start_time,
            )
            .await;
        rig.halt();
        stats
    }

    /// Wire up and drive the capture chain for one camera
    async fn run_capture<C, S>(
        &self,
        control: C,
        source: Box<dyn TriggerSource>,
        switch: Arc<S>,
        mut shutdown: watch::Receiver<bool>,
        start_time: Instant,
    ) -> Result<PipelineStats>
    where
        C: CameraControl,
        S: TriggerSwitch + 'static,
    {
        let blueprint = &self.config.blueprint;
        let tuning = blueprint.to_sync_tuning();

        // Trigger queue and sync state
        let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
        let activity = consumer.activity();
        let monitor = Arc::new(SyncMonitor::new());

        // Frame acquisition
        let mut acquisition = AcquisitionPipeline::new(
            blueprint.camera.id.as_str(),
            source,
            producer,
            BackpressureConfig::new(tuning.frame_channel_capacity),
        );
        let frames = acquisition
            .take_frame_stream()
            .context("Frame stream already taken")?;

        let info = CameraInfo {
            camera_id: CameraId::new(&blueprint.camera.id),
            width: blueprint.camera.width,
            height: blueprint.camera.height,
            calibration_url: blueprint.camera.calibration_url.clone(),
        };
        let mut correlator = FrameCorrelator::new(
            monitor.clone(),
            consumer,
            switch.clone(),
            tuning.clone(),
            blueprint.trigger.enabled,
            info,
        );

        // Dispatcher
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - stamped frames will be dropped");
        }
        let (stamped_tx, stamped_rx) = async_channel::bounded(tuning.frame_channel_capacity);
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), stamped_rx)
            .await
            .context("Failed to create dispatcher")?;
        let active_sinks = blueprint.sinks.len();
        let dispatcher_handle = dispatcher.spawn();

        // Worker shutdown flag, flipped once the capture loop exits
        let (worker_stop_tx, worker_stop_rx) = watch::channel(false);

        // Resync supervision only applies to externally triggered capture
        let supervisor_handle = if blueprint.trigger.enabled {
            let supervisor =
                ResyncSupervisor::new(monitor.clone(), activity, switch.clone(), tuning.clone());
            Some(supervisor.spawn(worker_stop_rx.clone()))
        } else {
            None
        };

        // Pulse listener first, so the enable handshake cannot outrun it
        acquisition.start();

        // Camera session: open, configure, stream on, enable trigger output
        let mut session = CameraSession::new(control, switch, blueprint.trigger.clone(), tuning);
        let descriptor = session
            .start(&blueprint.camera.settings, acquisition.frame_callback())
            .await
            .context("Failed to start camera session")?;
        info!(
            model = %descriptor.model,
            serial = %descriptor.serial,
            "Camera session started"
        );

        let acq_metrics = acquisition.metrics();
        let max_frames = self.config.max_frames;
        let mut stats = PipelineStats {
            active_sinks,
            ..PipelineStats::default()
        };

        // Pairing loop: resolve every capture event against the trigger
        // queue, account for it and hand it to dispatch
        let capture_loop = async {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutdown requested, stopping capture");
                            break;
                        }
                    }
                    event = frames.recv() => {
                        let Ok(event) = event else {
                            info!("Frame channel closed, capture finished");
                            break;
                        };

                        match correlator.correlate(event).await {
                            Some(frame) => {
                                acq_metrics.record_stamped();
                                stats.frames_stamped += 1;
                                stats.stamp_metrics.update(&frame);

                                debug!(
                                    seq = frame.seq,
                                    timestamp = format!("{:.6}", frame.timestamp),
                                    source = ?frame.stamp_source,
                                    "Frame stamped"
                                );

                                if stamped_tx.send(frame).await.is_err() {
                                    warn!("Dispatcher channel closed, stopping capture");
                                    break;
                                }

                                if max_frames.is_some_and(|max| stats.frames_stamped >= max) {
                                    info!(frames = stats.frames_stamped, "Frame limit reached");
                                    break;
                                }
                            }
                            None => acq_metrics.record_suppressed(),
                        }
                    }
                }
            }
        };

        match self.config.timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, capture_loop).await.is_err() {
                    warn!(
                        timeout_secs = limit.as_secs(),
                        "Pipeline timeout reached, stopping"
                    );
                }
            }
            None => capture_loop.await,
        }

        info!("Stopping pipeline...");

        // Supervisor first, so teardown cannot race an enable request
        let _ = worker_stop_tx.send(true);
        if let Some(handle) = supervisor_handle {
            let _ = handle.await;
        }

        acquisition.stop();

        if let Err(e) = session.shutdown().await {
            warn!(error = %e, "Camera session shutdown failed");
        }

        // Close the stamped channel and give the sinks a bounded drain window
        drop(stamped_tx);
        if tokio::time::timeout(Duration::from_secs(5), dispatcher_handle)
            .await
            .is_err()
        {
            warn!("Dispatcher did not drain within 5s, abandoning");
        }

        let snapshot = acq_metrics.snapshot();
        stats.pulses_received = snapshot.pulses_received;
        stats.frames_dropped = snapshot.frames_dropped + snapshot.frames_suppressed;
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = format!("{:.2}", stats.duration.as_secs_f64()),
            frames_stamped = stats.frames_stamped,
            pulses_received = stats.pulses_received,
            "Pipeline stopped"
        );

        Ok(stats)
    }
}
