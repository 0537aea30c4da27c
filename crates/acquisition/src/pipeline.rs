//! Acquisition pipeline main entry
//!
//! Owns both device-facing feeds and the pairing loop that turns raw
//! capture events into stamped frames.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use contracts::{CaptureEvent, FrameCallback, StampedFrame, TriggerSource, TriggerSwitch};
use sync_engine::{FrameCorrelator, TriggerProducer};
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::capture_feed::CaptureFeed;
use crate::config::{AcquisitionMetrics, BackpressureConfig};
use crate::error::{AcquisitionError, Result};
use crate::trigger_feed::TriggerFeed;

/// Acquisition pipeline
///
/// Bundles the pulse feed and the frame feed for one camera. The pulse feed
/// writes into the trigger queue, the frame feed into the bounded frame
/// channel; the `FramePump` joins the two downstream.
pub struct AcquisitionPipeline {
    trigger_feed: TriggerFeed,
    capture_feed: CaptureFeed,
    metrics: Arc<AcquisitionMetrics>,
}

impl AcquisitionPipeline {
    /// Create a new pipeline
    ///
    /// # Arguments
    /// * `camera_id` - Camera the frame feed belongs to
    /// * `source` - Pulse source to bridge into the trigger queue
    /// * `producer` - Write side of the trigger queue
    /// * `config` - Frame channel backpressure configuration
    pub fn new(
        camera_id: impl Into<String>,
        source: Box<dyn TriggerSource>,
        producer: TriggerProducer,
        config: BackpressureConfig,
    ) -> Self {
        let metrics = Arc::new(AcquisitionMetrics::new());
        Self {
            trigger_feed: TriggerFeed::new(source, producer),
            capture_feed: CaptureFeed::new(camera_id, &config, metrics.clone()),
            metrics,
        }
    }

    /// Frame delivery callback to register on the camera
    pub fn frame_callback(&self) -> FrameCallback {
        self.capture_feed.callback()
    }

    /// Take the frame stream consumer
    ///
    /// Can only be taken once.
    pub fn take_frame_stream(&mut self) -> Result<Receiver<CaptureEvent>> {
        self.capture_feed.take_receiver()
    }

    /// Start the pulse feed
    #[instrument(name = "acquisition_start", skip(self))]
    pub fn start(&self) {
        info!(source = %self.trigger_feed.source_id(), "starting acquisition");
        self.trigger_feed.start(self.metrics.clone());
    }

    /// Stop the pulse feed
    #[instrument(name = "acquisition_stop", skip(self))]
    pub fn stop(&self) {
        self.trigger_feed.stop();
    }

    /// Whether the pulse feed is running
    pub fn is_running(&self) -> bool {
        self.trigger_feed.is_running()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<AcquisitionMetrics> {
        self.metrics.clone()
    }
}

impl Drop for AcquisitionPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Frame pump
///
/// The pairing loop: takes capture events off the frame channel, lets the
/// correlator resolve them against the trigger queue, and forwards stamped
/// frames to dispatch. Backpressure from dispatch blocks the pump, never the
/// camera delivery thread.
pub struct FramePump<S: TriggerSwitch> {
    correlator: FrameCorrelator<S>,
    frames: Receiver<CaptureEvent>,
    output: Sender<StampedFrame>,
    metrics: Arc<AcquisitionMetrics>,
}

impl<S: TriggerSwitch> FramePump<S> {
    /// Create a new pump
    pub fn new(
        correlator: FrameCorrelator<S>,
        frames: Receiver<CaptureEvent>,
        output: Sender<StampedFrame>,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Self {
        Self {
            correlator,
            frames,
            output,
            metrics,
        }
    }

    /// Run the pairing loop
    ///
    /// Ends cleanly when the frame channel closes (camera detached) or the
    /// shutdown signal fires. A closed dispatch channel while frames are
    /// still flowing is an error.
    #[instrument(name = "frame_pump", skip(self, shutdown))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<u64> {
        info!("frame pump started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("frame pump stopping on shutdown signal");
                        break;
                    }
                }
                event = self.frames.recv() => {
                    match event {
                        Ok(event) => self.process(event).await?,
                        Err(_) => {
                            info!("frame channel closed, pump finished");
                            break;
                        }
                    }
                }
            }
        }

        let stamped = self.correlator.frame_count();
        info!(stamped, "frame pump stopped");
        Ok(stamped)
    }

    async fn process(&mut self, event: CaptureEvent) -> Result<()> {
        match self.correlator.correlate(event).await {
            Some(frame) => {
                self.metrics.record_stamped();
                self.metrics.update_queue_len(self.frames.len());
                if self.output.send(frame).await.is_err() {
                    return Err(AcquisitionError::ChannelClosed {
                        stage: "dispatch".to_string(),
                    });
                }
            }
            None => self.metrics.record_suppressed(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_channel::bounded;
    use bytes::Bytes;
    use contracts::{
        wall_clock, CameraId, CameraInfo, ContractError, FrameStatus, PixelFormat, RawFrame,
        StampSource, SyncTuning, TriggerCallback, TriggerPacket,
    };
    use sync_engine::{SyncMonitor, TriggerQueue};

    struct StubSwitch {
        enabled: AtomicBool,
    }

    impl StubSwitch {
        fn new() -> Self {
            Self {
                enabled: AtomicBool::new(true),
            }
        }
    }

    impl TriggerSwitch for StubSwitch {
        fn target(&self) -> &str {
            "imu_test"
        }

        async fn set_enabled(&self, enabled: bool) -> std::result::Result<(), ContractError> {
            self.enabled.store(enabled, Ordering::SeqCst);
            Ok(())
        }

        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::Relaxed)
        }
    }

    struct SilentSource;

    impl TriggerSource for SilentSource {
        fn source_id(&self) -> &str {
            "imu_test"
        }

        fn listen(&self, _callback: TriggerCallback) {}

        fn stop(&self) {}

        fn is_listening(&self) -> bool {
            false
        }
    }

    fn camera_info() -> CameraInfo {
        CameraInfo {
            camera_id: CameraId::new("cam_main"),
            width: 4,
            height: 4,
            calibration_url: None,
        }
    }

    fn event(hw_seq: u64, delivery_time: f64) -> CaptureEvent {
        CaptureEvent {
            frame: RawFrame {
                hw_seq,
                width: 4,
                height: 4,
                pixel_format: PixelFormat::Bgr8,
                status: FrameStatus::Success,
                data: Bytes::from_static(&[0u8; 48]),
            },
            delivery_time,
        }
    }

    fn tuning() -> SyncTuning {
        SyncTuning {
            trigger_wait_timeout: Duration::from_millis(10),
            ..SyncTuning::default()
        }
    }

    #[test]
    fn test_frame_stream_taken_once() {
        let (producer, _consumer) = TriggerQueue::with_slots(8);
        let mut pipeline = AcquisitionPipeline::new(
            "cam_main",
            Box::new(SilentSource),
            producer,
            BackpressureConfig::default(),
        );

        assert!(pipeline.take_frame_stream().is_ok());
        assert!(pipeline.take_frame_stream().is_err());
    }

    #[tokio::test]
    async fn test_pump_stamps_synced_frames() {
        let (mut producer, consumer) = TriggerQueue::with_slots(8);
        let monitor = Arc::new(SyncMonitor::new());
        let switch = Arc::new(StubSwitch::new());
        let correlator = FrameCorrelator::new(
            monitor,
            consumer,
            switch,
            tuning(),
            true,
            camera_info(),
        );

        let (frame_tx, frame_rx) = bounded(8);
        let (out_tx, out_rx) = bounded(8);
        let metrics = Arc::new(AcquisitionMetrics::new());
        let pump = FramePump::new(correlator, frame_rx, out_tx, metrics.clone());

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump_task = tokio::spawn(pump.run(shutdown_rx));

        let now = wall_clock();
        producer.push(TriggerPacket::new(now, 17));
        frame_tx.send(event(1, now + 0.004)).await.unwrap();

        let stamped = out_rx.recv().await.unwrap();
        assert_eq!(stamped.seq, 1);
        assert_eq!(stamped.stamp_source, StampSource::Trigger);
        assert_eq!(stamped.sync_meta.trigger_counter, Some(17));

        // Closing the frame channel ends the pump cleanly
        drop(frame_tx);
        let stamped_count = pump_task.await.unwrap().unwrap();
        assert_eq!(stamped_count, 1);
        assert_eq!(metrics.snapshot().frames_stamped, 1);
    }

    #[tokio::test]
    async fn test_pump_errors_when_dispatch_closes() {
        let (mut producer, consumer) = TriggerQueue::with_slots(8);
        let correlator = FrameCorrelator::new(
            Arc::new(SyncMonitor::new()),
            consumer,
            Arc::new(StubSwitch::new()),
            tuning(),
            true,
            camera_info(),
        );

        let (frame_tx, frame_rx) = bounded(8);
        let (out_tx, out_rx) = bounded(8);
        let metrics = Arc::new(AcquisitionMetrics::new());
        let pump = FramePump::new(correlator, frame_rx, out_tx, metrics);

        drop(out_rx);
        let now = wall_clock();
        producer.push(TriggerPacket::new(now, 1));
        frame_tx.send(event(1, now + 0.004)).await.unwrap();

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let result = pump.run(shutdown_rx).await;
        assert!(matches!(
            result,
            Err(AcquisitionError::ChannelClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_pump_stops_on_shutdown_signal() {
        let (_producer, consumer) = TriggerQueue::with_slots(8);
        let correlator = FrameCorrelator::new(
            Arc::new(SyncMonitor::new()),
            consumer,
            Arc::new(StubSwitch::new()),
            tuning(),
            true,
            camera_info(),
        );

        let (_frame_tx, frame_rx) = bounded::<CaptureEvent>(8);
        let (out_tx, _out_rx) = bounded(8);
        let metrics = Arc::new(AcquisitionMetrics::new());
        let pump = FramePump::new(correlator, frame_rx, out_tx, metrics);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pump_task = tokio::spawn(pump.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), pump_task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
