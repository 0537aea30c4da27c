//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置到运行时参数的贯通验证
//! - 模拟 rig 上的端到端采集测试（无需相机硬件）
//! - 掉同步检测与自动恢复的闭环验证
//! - 分发器多 sink 扇出测试

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::ConfigVersion;

    #[test]
    fn test_minimal_config_is_runnable() {
        // 只给相机 ID，其余全部走默认值
        let toml = r#"
            [camera]
            id = "cam_it"
        "#;

        let blueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert!(blueprint.trigger.enabled);
        assert!(blueprint.sinks.is_empty());

        let tuning = blueprint.to_sync_tuning();
        assert_eq!(tuning.queue_slots, 1023);
        assert!(tuning.resync_interval <= tuning.trigger_stale_after);
    }

    #[test]
    fn test_config_rejects_resync_faster_than_stale_window() {
        let toml = r#"
            [camera]
            id = "cam_it"

            [sync]
            resync_interval_ms = 2000
            trigger_stale_after_ms = 100
        "#;

        let result = ConfigLoader::load_from_str(toml, ConfigFormat::Toml);
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use acquisition::{AcquisitionPipeline, BackpressureConfig, FramePump};
    use camera_rig::{CameraSession, MockRig, MockRigConfig};
    use contracts::{
        wall_clock, CameraId, CameraInfo, CameraSettings, PixelFormat, SinkConfig, SinkType,
        StampMeta, StampSource, StampedFrame, SyncTuning, SyncTuningConfig, TriggerConfig,
    };
    use dispatcher::create_dispatcher;
    use observability::StampMetricsAggregator;
    use sync_engine::{FrameCorrelator, ResyncSupervisor, SyncMonitor, TriggerQueue};
    use tokio::sync::watch;

    /// 恢复窗口压短，让掉同步测试在几百毫秒内闭环
    fn fast_tuning() -> SyncTuning {
        SyncTuningConfig {
            resync_interval_ms: 50,
            trigger_stale_after_ms: 120,
            ..SyncTuningConfig::default()
        }
        .to_tuning()
    }

    fn camera_info(id: &str, width: u32, height: u32) -> CameraInfo {
        CameraInfo {
            camera_id: CameraId::new(id),
            width,
            height,
            calibration_url: None,
        }
    }

    fn log_sink(name: &str) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 32,
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_e2e_trigger_stamping() {
        let rig = MockRig::new(
            "cam_e2e",
            "imu_e2e",
            MockRigConfig {
                frame_rate_hz: 200.0,
                width: 64,
                height: 48,
                ..MockRigConfig::default()
            },
        );
        let tuning = fast_tuning();

        let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
        let monitor = Arc::new(SyncMonitor::new());
        let switch = Arc::new(rig.switch());

        let mut acquisition = AcquisitionPipeline::new(
            "cam_e2e",
            Box::new(rig.trigger_source()),
            producer,
            BackpressureConfig::new(64),
        );
        let frames = acquisition.take_frame_stream().unwrap();

        let correlator = FrameCorrelator::new(
            monitor.clone(),
            consumer,
            switch.clone(),
            tuning.clone(),
            true,
            camera_info("cam_e2e", 64, 48),
        );

        let (stamped_tx, stamped_rx) = async_channel::bounded(64);
        let pump = FramePump::new(correlator, frames, stamped_tx, acquisition.metrics());
        let (stop_tx, stop_rx) = watch::channel(false);
        let pump_handle = tokio::spawn(pump.run(stop_rx));

        acquisition.start();
        let mut session = CameraSession::new(
            rig.camera(),
            switch.clone(),
            TriggerConfig::default(),
            tuning,
        );
        session
            .start(&CameraSettings::default(), acquisition.frame_callback())
            .await
            .unwrap();
        assert!(rig.applied_settings().is_some());

        let mut collected: Vec<StampedFrame> = Vec::new();
        let collect = tokio::time::timeout(Duration::from_secs(3), async {
            while collected.len() < 10 {
                match stamped_rx.recv().await {
                    Ok(frame) => collected.push(frame),
                    Err(_) => break,
                }
            }
        })
        .await;
        assert!(collect.is_ok(), "timed out collecting stamped frames");
        assert_eq!(collected.len(), 10);

        stop_tx.send(true).unwrap();
        let stamped = pump_handle.await.unwrap().unwrap();
        assert!(stamped >= 10);

        session.shutdown().await.unwrap();
        acquisition.stop();
        rig.halt();

        // 每一帧都由触发脉冲打戳，时延为小的非负值
        for frame in &collected {
            assert_eq!(frame.stamp_source, StampSource::Trigger);
            let latency = frame.sync_meta.trigger_latency.unwrap();
            assert!(
                (0.0..0.5).contains(&latency),
                "latency out of range: {latency}"
            );
        }

        // 计数器逐一递增，基线只在首帧建立
        for pair in collected.windows(2) {
            let prev = pair[0].sync_meta.trigger_counter.unwrap();
            let next = pair[1].sync_meta.trigger_counter.unwrap();
            assert_eq!(next, prev.wrapping_add(1), "counters must be consecutive");
        }
        assert!(collected[0].sync_meta.adopted_baseline);
        assert!(collected[1..].iter().all(|f| !f.sync_meta.adopted_baseline));

        let mut aggregator = StampMetricsAggregator::new();
        for frame in &collected {
            aggregator.update(frame);
        }
        let summary = aggregator.summary();
        assert_eq!(summary.total_frames, 10);
        assert_eq!(summary.trigger_stamped, 10);
        assert_eq!(summary.baseline_adoptions, 1);
        assert!((summary.sync_rate - 100.0).abs() < 1e-9);

        // 使能握手只发生一次，且是开启请求
        assert_eq!(rig.enable_requests(), vec![true]);
        assert_eq!(monitor.episode_count(), 0);
    }

    #[tokio::test]
    async fn test_e2e_pipeline_with_dispatcher() {
        let rig = MockRig::new(
            "cam_disp",
            "imu_disp",
            MockRigConfig {
                frame_rate_hz: 200.0,
                width: 32,
                height: 24,
                ..MockRigConfig::default()
            },
        );
        let tuning = fast_tuning();

        let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
        let monitor = Arc::new(SyncMonitor::new());
        let switch = Arc::new(rig.switch());

        let mut acquisition = AcquisitionPipeline::new(
            "cam_disp",
            Box::new(rig.trigger_source()),
            producer,
            BackpressureConfig::new(32),
        );
        let frames = acquisition.take_frame_stream().unwrap();

        let correlator = FrameCorrelator::new(
            monitor,
            consumer,
            switch.clone(),
            tuning.clone(),
            true,
            camera_info("cam_disp", 32, 24),
        );

        let (stamped_tx, stamped_rx) = async_channel::bounded(32);
        let dispatcher = create_dispatcher(vec![log_sink("console")], stamped_rx)
            .await
            .unwrap();
        assert_eq!(dispatcher.metrics().len(), 1);
        let dispatcher_handle = dispatcher.spawn();

        let pump = FramePump::new(correlator, frames, stamped_tx, acquisition.metrics());
        let (stop_tx, stop_rx) = watch::channel(false);
        let pump_handle = tokio::spawn(pump.run(stop_rx));

        acquisition.start();
        let mut session = CameraSession::new(
            rig.camera(),
            switch.clone(),
            TriggerConfig::default(),
            tuning,
        );
        session
            .start(&CameraSettings::default(), acquisition.frame_callback())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        stop_tx.send(true).unwrap();
        let stamped = pump_handle.await.unwrap().unwrap();
        assert!(stamped > 0, "pipeline produced no stamped frames");

        session.shutdown().await.unwrap();
        acquisition.stop();
        rig.halt();

        // 泵结束后发送端关闭，分发器应排空队列并退出
        let drained = tokio::time::timeout(Duration::from_secs(2), dispatcher_handle).await;
        assert!(drained.is_ok(), "dispatcher did not drain after close");
    }

    #[tokio::test]
    async fn test_e2e_free_run_clock_stamps() {
        let rig = MockRig::new(
            "cam_free",
            "imu_free",
            MockRigConfig {
                frame_rate_hz: 120.0,
                width: 32,
                height: 24,
                ..MockRigConfig::default()
            },
        );
        let tuning = fast_tuning();

        let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
        let monitor = Arc::new(SyncMonitor::new());
        let switch = Arc::new(rig.switch());

        let mut acquisition = AcquisitionPipeline::new(
            "cam_free",
            Box::new(rig.trigger_source()),
            producer,
            BackpressureConfig::new(32),
        );
        let frames = acquisition.take_frame_stream().unwrap();

        let correlator = FrameCorrelator::new(
            monitor,
            consumer,
            switch.clone(),
            tuning.clone(),
            false,
            camera_info("cam_free", 32, 24),
        );

        let (stamped_tx, stamped_rx) = async_channel::bounded(32);
        let pump = FramePump::new(correlator, frames, stamped_tx, acquisition.metrics());
        let (stop_tx, stop_rx) = watch::channel(false);
        let pump_handle = tokio::spawn(pump.run(stop_rx));

        acquisition.start();
        let trigger = TriggerConfig {
            enabled: false,
            ..TriggerConfig::default()
        };
        let mut session = CameraSession::new(rig.camera(), switch.clone(), trigger, tuning);
        session
            .start(&CameraSettings::default(), acquisition.frame_callback())
            .await
            .unwrap();

        let mut collected: Vec<StampedFrame> = Vec::new();
        let collect = tokio::time::timeout(Duration::from_secs(3), async {
            while collected.len() < 5 {
                match stamped_rx.recv().await {
                    Ok(frame) => collected.push(frame),
                    Err(_) => break,
                }
            }
        })
        .await;
        assert!(collect.is_ok(), "timed out collecting free-run frames");

        stop_tx.send(true).unwrap();
        pump_handle.await.unwrap().unwrap();
        session.shutdown().await.unwrap();
        acquisition.stop();
        rig.halt();

        // 自由采集模式：本地时钟打戳，无触发元数据
        for frame in &collected {
            assert_eq!(frame.stamp_source, StampSource::DeliveryClock);
            assert!(frame.sync_meta.trigger_counter.is_none());
            assert!(frame.sync_meta.trigger_latency.is_none());
            assert!(!frame.sync_meta.adopted_baseline);
        }

        // 无脉冲、无使能握手
        assert_eq!(rig.pulse_count(), 0);
        assert!(rig.enable_requests().is_empty());
    }

    #[tokio::test]
    async fn test_e2e_desync_recovery() {
        // 每第 40 个脉冲被吞掉，硬件计数器照常前进，制造计数缺口
        let rig = MockRig::new(
            "cam_gap",
            "imu_gap",
            MockRigConfig {
                frame_rate_hz: 200.0,
                width: 32,
                height: 24,
                drop_pulse_every: Some(40),
                ..MockRigConfig::default()
            },
        );
        let tuning = fast_tuning();

        let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
        let monitor = Arc::new(SyncMonitor::new());
        let switch = Arc::new(rig.switch());
        let activity = consumer.activity();

        let mut acquisition = AcquisitionPipeline::new(
            "cam_gap",
            Box::new(rig.trigger_source()),
            producer,
            BackpressureConfig::new(64),
        );
        let frames = acquisition.take_frame_stream().unwrap();

        let correlator = FrameCorrelator::new(
            monitor.clone(),
            consumer,
            switch.clone(),
            tuning.clone(),
            true,
            camera_info("cam_gap", 32, 24),
        );

        let (stamped_tx, stamped_rx) = async_channel::bounded(64);
        let pump = FramePump::new(correlator, frames, stamped_tx, acquisition.metrics());
        let (stop_tx, stop_rx) = watch::channel(false);
        let supervisor_handle =
            ResyncSupervisor::new(monitor.clone(), activity, switch.clone(), tuning.clone())
                .spawn(stop_rx.clone());
        let pump_handle = tokio::spawn(pump.run(stop_rx));

        acquisition.start();
        let mut session = CameraSession::new(
            rig.camera(),
            switch.clone(),
            TriggerConfig::default(),
            tuning,
        );
        session
            .start(&CameraSettings::default(), acquisition.frame_callback())
            .await
            .unwrap();

        // 55 帧横跨缺口：约 39 帧正常，掉同步，恢复后继续
        let mut collected: Vec<StampedFrame> = Vec::new();
        let collect = tokio::time::timeout(Duration::from_secs(5), async {
            while collected.len() < 55 {
                match stamped_rx.recv().await {
                    Ok(frame) => collected.push(frame),
                    Err(_) => break,
                }
            }
        })
        .await;
        assert!(collect.is_ok(), "timed out waiting for desync recovery");

        stop_tx.send(true).unwrap();
        pump_handle.await.unwrap().unwrap();
        supervisor_handle.await.unwrap();
        session.shutdown().await.unwrap();
        acquisition.stop();
        rig.halt();

        assert!(
            monitor.episode_count() >= 1,
            "counter gap must open a desync episode"
        );

        // 基线：首帧一次，每轮恢复后再一次
        let adoptions: Vec<usize> = collected
            .iter()
            .enumerate()
            .filter(|(_, f)| f.sync_meta.adopted_baseline)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(adoptions.first(), Some(&0));
        assert!(
            adoptions.len() >= 2,
            "recovery must adopt a fresh baseline, adoptions at {adoptions:?}"
        );

        // 恢复后仍按触发打戳
        let last = collected.last().unwrap();
        assert_eq!(last.stamp_source, StampSource::Trigger);
        assert!(last.sync_meta.trigger_counter.is_some());

        // 使能请求：启动握手一次，自动恢复至少一次
        let enables = rig.enable_requests().iter().filter(|&&e| e).count();
        assert!(enables >= 2, "expected startup enable plus a resync enable");
    }

    #[tokio::test]
    async fn test_dispatcher_multiple_sinks() {
        let (tx, rx) = async_channel::bounded::<StampedFrame>(16);

        let dispatcher = create_dispatcher(vec![log_sink("primary"), log_sink("secondary")], rx)
            .await
            .unwrap();
        assert_eq!(dispatcher.metrics().len(), 2);
        let handle = dispatcher.spawn();

        for seq in 0..5u64 {
            let frame = StampedFrame {
                timestamp: wall_clock(),
                seq,
                stamp_source: StampSource::Trigger,
                width: 2,
                height: 2,
                pixel_format: PixelFormat::Mono8,
                data: bytes::Bytes::from_static(&[0u8; 4]),
                info: camera_info("cam_fanout", 2, 2),
                sync_meta: StampMeta {
                    trigger_counter: Some(seq as u32 + 1),
                    trigger_latency: Some(0.003),
                    adopted_baseline: seq == 0,
                    queue_depth: 0,
                },
            };
            tx.send(frame).await.unwrap();
        }
        drop(tx);

        let drained = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(drained.is_ok(), "dispatcher did not drain both sinks");
    }
}
