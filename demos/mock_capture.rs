//! Mock Capture Example
//!
//! Demonstrates the full trigger-synchronized capture chain against the
//! simulated rig: blueprint loading, camera bring-up, pulse pairing and
//! dispatcher fan-out. Runs without camera or IMU hardware.
//!
//! Run with: cargo run --bin mock_capture [config_path]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use acquisition::{AcquisitionPipeline, BackpressureConfig};
use camera_rig::{CameraSession, MockRig, MockRigConfig};
use config_loader::ConfigLoader;
use contracts::{
    CameraConfig, CameraId, CameraInfo, CameraSettings, ConfigVersion, PixelFormat, RigBlueprint,
    SinkConfig, SinkType, StampedFrame, SyncTuningConfig, TriggerConfig,
};
use dispatcher::create_dispatcher;
use sync_engine::{FrameCorrelator, SyncMonitor, TriggerQueue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Capture Demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        // Create a minimal test blueprint
        create_test_blueprint()
    };
    let tuning = blueprint.to_sync_tuning();

    // ==== Stage 2: Build the simulated rig described by the blueprint ====
    tracing::info!(
        camera_id = %blueprint.camera.id,
        source_id = %blueprint.trigger.source_id,
        "Creating mock rig"
    );
    let rig = MockRig::new(
        blueprint.camera.id.as_str(),
        blueprint.trigger.source_id.as_str(),
        MockRigConfig {
            frame_rate_hz: blueprint.camera.frame_rate_hz,
            width: blueprint.camera.width,
            height: blueprint.camera.height,
            pixel_format: blueprint.camera.pixel_format,
            ..MockRigConfig::default()
        },
    );

    // ==== Stage 3: Create Dispatcher with sinks from config ====
    let (stamped_tx, stamped_rx) = async_channel::bounded::<StampedFrame>(100);
    let dispatcher = create_dispatcher(blueprint.sinks.clone(), stamped_rx).await?;
    let dispatcher_handle = dispatcher.spawn();

    // ==== Stage 4: Wire the sync engine ====
    let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
    let monitor = Arc::new(SyncMonitor::new());
    let switch = Arc::new(rig.switch());

    let mut acquisition = AcquisitionPipeline::new(
        blueprint.camera.id.as_str(),
        Box::new(rig.trigger_source()),
        producer,
        BackpressureConfig::new(tuning.frame_channel_capacity),
    );
    let frames = acquisition.take_frame_stream()?;

    let mut correlator = FrameCorrelator::new(
        monitor,
        consumer,
        switch.clone(),
        tuning.clone(),
        blueprint.trigger.enabled,
        CameraInfo {
            camera_id: CameraId::new(&blueprint.camera.id),
            width: blueprint.camera.width,
            height: blueprint.camera.height,
            calibration_url: blueprint.camera.calibration_url.clone(),
        },
    );

    // ==== Stage 5: Bring the camera up ====
    tracing::info!("Starting camera session...");
    acquisition.start();
    let mut session = CameraSession::new(
        rig.camera(),
        switch,
        blueprint.trigger.clone(),
        tuning,
    );
    let descriptor = session
        .start(&blueprint.camera.settings, acquisition.frame_callback())
        .await?;
    tracing::info!(model = %descriptor.model, serial = %descriptor.serial, "Camera streaming");

    // ==== Stage 6: Run Pipeline ====
    let target_frames = 50u64;
    tracing::info!(target_frames, "Running pipeline");

    let pipeline_handle = tokio::spawn(async move {
        let mut stamped_count = 0u64;

        while let Ok(event) = frames.recv().await {
            if let Some(frame) = correlator.correlate(event).await {
                stamped_count += 1;
                tracing::info!(
                    seq = frame.seq,
                    trigger_counter = frame.sync_meta.trigger_counter,
                    latency_ms = frame.sync_meta.trigger_latency.map(|l| l * 1000.0),
                    "Stamped frame produced"
                );

                if stamped_tx.send(frame).await.is_err() {
                    break;
                }

                if stamped_count >= target_frames {
                    break;
                }
            }
        }
        stamped_count
    });

    // Wait for pipeline or timeout
    let result = tokio::time::timeout(Duration::from_secs(10), pipeline_handle).await;

    // ==== Stage 7: Graceful Shutdown ====
    tracing::info!("Shutting down...");
    acquisition.stop();
    session.shutdown().await?;
    rig.halt();

    let _ = tokio::time::timeout(Duration::from_secs(2), dispatcher_handle).await;

    match result {
        Ok(Ok(count)) => tracing::info!(frames = count, "Pipeline completed successfully"),
        Ok(Err(e)) => tracing::warn!("Pipeline task error: {:?}", e),
        Err(_) => tracing::warn!("Pipeline timed out"),
    }

    tracing::info!("Mock Capture Demo finished");
    Ok(())
}

fn create_test_blueprint() -> RigBlueprint {
    RigBlueprint {
        version: ConfigVersion::V1,
        camera: CameraConfig {
            id: "cam_demo".to_string(),
            serial: None,
            calibration_url: None,
            width: 320,
            height: 240,
            offset_x: 0,
            offset_y: 0,
            pixel_format: PixelFormat::Bgr8,
            frame_rate_hz: 120.0,
            settings: CameraSettings::default(),
        },
        trigger: TriggerConfig {
            source_id: "imu_demo".to_string(),
            ..TriggerConfig::default()
        },
        sync: SyncTuningConfig::default(),
        sinks: vec![SinkConfig {
            name: "console".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 100,
            params: HashMap::new(),
        }],
    }
}
