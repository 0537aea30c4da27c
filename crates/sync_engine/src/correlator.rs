//! Frame-to-trigger correlation.
//!
//! Runs in the frame-ready context: for every complete frame it pops the
//! matching trigger packet, validates counter continuity and latency, and
//! stamps the frame with the trigger instant. Any validation failure
//! degrades the sync state, drains the queue and asks the trigger source
//! to stop firing until the supervisor re-establishes sync.

use std::sync::Arc;

use contracts::{
    CameraInfo, CaptureEvent, FrameStatus, StampMeta, StampSource, StampedFrame, SyncTuning,
    TriggerSwitch,
};
use tracing::instrument;

use crate::monitor::{CounterCheck, DesyncReason, SyncMonitor};
use crate::trigger_queue::TriggerConsumer;

/// Pairs frames with trigger packets and resolves their timestamps.
pub struct FrameCorrelator<S: TriggerSwitch> {
    /// Sync state and expected-counter cursor
    monitor: Arc<SyncMonitor>,
    /// Consumer half of the trigger queue
    consumer: TriggerConsumer,
    /// Remote control of the trigger source
    switch: Arc<S>,
    /// Latency and wait budgets
    tuning: SyncTuning,
    /// Whether external triggering is configured at all
    trigger_enabled: bool,
    /// Camera info attached to every output frame
    info: CameraInfo,
    /// Output sequence counter
    seq: u64,
    /// A desync-time disable request failed and needs a retry
    disable_pending: bool,
}

impl<S: TriggerSwitch> FrameCorrelator<S> {
    pub fn new(
        monitor: Arc<SyncMonitor>,
        consumer: TriggerConsumer,
        switch: Arc<S>,
        tuning: SyncTuning,
        trigger_enabled: bool,
        info: CameraInfo,
    ) -> Self {
        Self {
            monitor,
            consumer,
            switch,
            tuning,
            trigger_enabled,
            info,
            seq: 0,
            disable_pending: false,
        }
    }

    /// Resolve a frame event into a stamped frame.
    ///
    /// Returns `None` when the frame is dropped: bad transfer status,
    /// suppression while unsynced, or the validation failure that started
    /// a desync episode.
    #[instrument(
        name = "correlate_frame",
        level = "trace",
        skip(self, event),
        fields(hw_seq = event.frame.hw_seq, delivery_time = event.delivery_time)
    )]
    pub async fn correlate(&mut self, event: CaptureEvent) -> Option<StampedFrame> {
        if event.frame.status != FrameStatus::Success {
            tracing::error!(
                status = ?event.frame.status,
                hw_seq = event.frame.hw_seq,
                "dropping frame with bad transfer status"
            );
            metrics::counter!("framelock_frames_total", "outcome" => "bad_status").increment(1);
            return None;
        }

        if !self.trigger_enabled {
            metrics::counter!("framelock_frames_total", "outcome" => "free_run").increment(1);
            let delivery_time = event.delivery_time;
            return Some(self.stamp(
                event,
                delivery_time,
                StampSource::DeliveryClock,
                StampMeta::default(),
            ));
        }

        if !self.monitor.is_synced() {
            if self.disable_pending {
                self.request_disable().await;
            }
            tracing::debug!("suppressing frame while unsynced");
            metrics::counter!("framelock_frames_total", "outcome" => "suppressed").increment(1);
            return None;
        }

        // When adopting a fresh baseline, only the newest packet can belong
        // to this frame; older queued pulses predate the episode.
        let packet = if self.monitor.is_adopting() {
            match self.consumer.skip_to_freshest() {
                Some(packet) => Some(packet),
                None => {
                    self.consumer
                        .pop_timeout(self.tuning.trigger_wait_timeout)
                        .await
                }
            }
        } else {
            self.consumer
                .pop_timeout(self.tuning.trigger_wait_timeout)
                .await
        };

        let Some(packet) = packet else {
            self.handle_desync(DesyncReason::TriggerTimeout {
                waited: self.tuning.trigger_wait_timeout,
            })
            .await;
            return None;
        };

        let adopted = match self.monitor.observe_counter(packet.trigger_counter) {
            CounterCheck::Adopted => true,
            CounterCheck::Matched => false,
            CounterCheck::Mismatch { expected } => {
                self.handle_desync(DesyncReason::CounterMismatch {
                    expected,
                    observed: packet.trigger_counter,
                })
                .await;
                return None;
            }
        };

        let latency = event.delivery_time - packet.trigger_time;
        let limit = self.tuning.max_trigger_latency.as_secs_f64();
        if latency < 0.0 {
            self.handle_desync(DesyncReason::NegativeLatency { latency }).await;
            return None;
        }
        if latency > limit {
            self.handle_desync(DesyncReason::StaleLatency { latency, limit }).await;
            return None;
        }

        if adopted {
            tracing::info!(
                trigger_counter = packet.trigger_counter,
                latency,
                "adopted fresh trigger counter baseline"
            );
        }

        metrics::histogram!("framelock_trigger_latency_seconds").record(latency);
        metrics::counter!("framelock_frames_total", "outcome" => "synced").increment(1);

        let sync_meta = StampMeta {
            trigger_counter: Some(packet.trigger_counter),
            trigger_latency: Some(latency),
            adopted_baseline: adopted,
            queue_depth: self.consumer.len(),
        };
        Some(self.stamp(event, packet.trigger_time, StampSource::Trigger, sync_meta))
    }

    /// Frames emitted so far.
    pub fn frame_count(&self) -> u64 {
        self.seq
    }

    /// Trigger packets currently queued.
    pub fn queue_depth(&self) -> usize {
        self.consumer.len()
    }

    fn stamp(
        &mut self,
        event: CaptureEvent,
        timestamp: f64,
        stamp_source: StampSource,
        sync_meta: StampMeta,
    ) -> StampedFrame {
        self.seq += 1;
        StampedFrame {
            timestamp,
            seq: self.seq,
            stamp_source,
            width: event.frame.width,
            height: event.frame.height,
            pixel_format: event.frame.pixel_format,
            data: event.frame.data,
            info: self.info.clone(),
            sync_meta,
        }
    }

    /// Start (or continue) a desync episode for the current frame.
    async fn handle_desync(&mut self, reason: DesyncReason) {
        let episode_started = self.monitor.mark_unsynced(reason);
        let drained = self.consumer.drain();
        if episode_started {
            match reason {
                DesyncReason::CounterMismatch { .. } => {
                    tracing::warn!(drained, "trigger counter diverged, a pulse or frame was lost");
                }
                DesyncReason::NegativeLatency { .. } => {
                    tracing::warn!(
                        drained,
                        "frame arrived before its trigger, an upstream frame was likely dropped"
                    );
                }
                DesyncReason::StaleLatency { .. } => {
                    tracing::warn!(
                        drained,
                        source = %self.switch.target(),
                        "trigger packets are stale, source may not actually drive the camera"
                    );
                }
                DesyncReason::TriggerTimeout { .. } => {
                    tracing::warn!(drained, "frame had no trigger packet to pair with");
                }
            }
        }
        self.request_disable().await;
        metrics::counter!("framelock_frames_total", "outcome" => "suppressed").increment(1);
    }

    async fn request_disable(&mut self) {
        match self.switch.set_enabled(false).await {
            Ok(()) => {
                self.disable_pending = false;
                tracing::info!(
                    source = %self.switch.target(),
                    "trigger source disabled until resync"
                );
            }
            Err(error) => {
                self.disable_pending = true;
                tracing::warn!(
                    source = %self.switch.target(),
                    %error,
                    "trigger disable request failed, will retry"
                );
            }
        }
    }
}
