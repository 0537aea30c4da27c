//! Desync Recovery Example
//!
//! Injects a periodic pulse dropout into the simulated rig and shows the
//! full recovery cycle: the counter gap is detected, trigger output is shut
//! off, the supervisor notices the silence and re-enables it, and the next
//! matched frame re-establishes the counter baseline.
//!
//! Run with: cargo run --bin desync_recovery

use std::sync::Arc;
use std::time::Duration;

use acquisition::{AcquisitionPipeline, BackpressureConfig};
use camera_rig::{CameraSession, MockRig, MockRigConfig};
use contracts::{CameraId, CameraInfo, CameraSettings, SyncTuningConfig, TriggerConfig};
use observability::metrics::StampMetricsAggregator;
use sync_engine::{FrameCorrelator, ResyncSupervisor, SyncMonitor, TriggerQueue};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Desync Recovery Demo");

    // ==== Stage 1: Build a rig that swallows every 40th pulse ====
    // The hardware counter keeps advancing across the dropout, so the
    // delivered counter stream shows a gap roughly five times per second.
    let rig = MockRig::new(
        "cam_demo",
        "imu_demo",
        MockRigConfig {
            frame_rate_hz: 200.0,
            width: 64,
            height: 48,
            drop_pulse_every: Some(40),
            ..MockRigConfig::default()
        },
    );

    // Tightened supervision so the demo recovers within a few hundred ms
    let tuning = SyncTuningConfig {
        resync_interval_ms: 50,
        trigger_stale_after_ms: 120,
        ..SyncTuningConfig::default()
    }
    .to_tuning();

    // ==== Stage 2: Wire the sync engine ====
    let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
    let monitor = Arc::new(SyncMonitor::new());
    let switch = Arc::new(rig.switch());
    let activity = consumer.activity();

    let mut acquisition = AcquisitionPipeline::new(
        "cam_demo",
        Box::new(rig.trigger_source()),
        producer,
        BackpressureConfig::new(tuning.frame_channel_capacity),
    );
    let frames = acquisition.take_frame_stream()?;

    let mut correlator = FrameCorrelator::new(
        monitor.clone(),
        consumer,
        switch.clone(),
        tuning.clone(),
        true,
        CameraInfo {
            camera_id: CameraId::new("cam_demo"),
            width: 64,
            height: 48,
            calibration_url: None,
        },
    );

    // ==== Stage 3: Start the resync supervisor ====
    let (stop_tx, stop_rx) = watch::channel(false);
    let supervisor_handle =
        ResyncSupervisor::new(monitor.clone(), activity, switch.clone(), tuning.clone())
            .spawn(stop_rx);

    // ==== Stage 4: Bring the camera up ====
    acquisition.start();
    let mut session = CameraSession::new(
        rig.camera(),
        switch,
        TriggerConfig::default(),
        tuning,
    );
    session
        .start(&CameraSettings::default(), acquisition.frame_callback())
        .await?;
    tracing::info!("Camera streaming, waiting for the first dropout...");

    // ==== Stage 5: Run until several recovery cycles have completed ====
    let target_frames = 120u64;

    let pipeline_handle = tokio::spawn(async move {
        let mut aggregator = StampMetricsAggregator::new();
        let mut stamped_count = 0u64;

        while let Ok(event) = frames.recv().await {
            if let Some(frame) = correlator.correlate(event).await {
                stamped_count += 1;

                if frame.sync_meta.adopted_baseline && stamped_count > 1 {
                    tracing::warn!(
                        seq = frame.seq,
                        trigger_counter = frame.sync_meta.trigger_counter,
                        "Counter baseline re-established after desync"
                    );
                }

                aggregator.update(&frame);
                if stamped_count >= target_frames {
                    break;
                }
            }
        }

        (stamped_count, aggregator)
    });

    let result = tokio::time::timeout(Duration::from_secs(15), pipeline_handle).await;

    // ==== Stage 6: Cleanup ====
    tracing::info!("Shutting down...");
    let _ = stop_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(1), supervisor_handle).await;

    acquisition.stop();
    session.shutdown().await?;
    rig.halt();

    match result {
        Ok(Ok((count, aggregator))) => {
            let enables = rig.enable_requests();
            tracing::info!(
                frames = count,
                desync_episodes = monitor.episode_count(),
                enable_requests = enables.len(),
                "Pipeline completed"
            );
            println!("{}", aggregator.summary());
        }
        Ok(Err(e)) => tracing::warn!("Pipeline task error: {:?}", e),
        Err(_) => tracing::warn!("Pipeline timed out"),
    }

    tracing::info!("Desync Recovery Demo finished");
    Ok(())
}
