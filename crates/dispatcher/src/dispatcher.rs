//! Fan-out loop from the stamped-frame channel to all configured sinks.

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{SinkConfig, SinkType, StampedFrame};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Consumes stamped frames and clones them out to every sink worker.
///
/// Frames are `Bytes`-backed, so the per-sink clone is a reference-count
/// bump, not a pixel copy.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: Receiver<StampedFrame>,
}

impl Dispatcher {
    /// Assemble a dispatcher with pre-built sink handles.
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: Receiver<StampedFrame>) -> Self {
        Self { handles, input_rx }
    }

    /// Per-sink metric snapshots, keyed by sink name.
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Pump frames until the input channel closes, then shut sinks down
    /// in order so each gets to flush.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(self) {
        info!(sinks = self.handles.len(), "dispatcher started");

        let mut dispatched: u64 = 0;
        while let Ok(frame) = self.input_rx.recv().await {
            for handle in &self.handles {
                handle.try_send(frame.clone());
            }
            dispatched += 1;
            if dispatched.is_multiple_of(100) {
                debug!(frames = dispatched, "dispatch progress");
            }
        }

        info!(frames = dispatched, "input closed, draining sinks");
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("dispatcher stopped");
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Build a dispatcher by instantiating one sink per config entry.
///
/// Fails fast: a sink that cannot be constructed (bad params, unreachable
/// endpoint) aborts the whole build rather than silently running without it.
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx), fields(sink_count = sink_configs.len()))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: Receiver<StampedFrame>,
) -> Result<Dispatcher, DispatcherError> {
    let mut handles = Vec::with_capacity(sink_configs.len());
    for config in &sink_configs {
        handles.push(build_sink(config).await?);
    }
    Ok(Dispatcher::with_handles(handles, input_rx))
}

async fn build_sink(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    debug!(sink = %config.name, sink_type = ?config.sink_type, "creating sink");
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(
            LogSink::new(&config.name),
            config.queue_capacity,
        )),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bytes::Bytes;
    use contracts::{CameraId, CameraInfo, PixelFormat, StampMeta, StampSource};

    use super::*;

    fn frame(seq: u64) -> StampedFrame {
        StampedFrame {
            timestamp: seq as f64,
            seq,
            stamp_source: StampSource::Trigger,
            width: 2,
            height: 2,
            pixel_format: PixelFormat::Bgr8,
            data: Bytes::from_static(&[0u8; 12]),
            info: CameraInfo {
                camera_id: CameraId::new("cam_main"),
                width: 2,
                height: 2,
                calibration_url: None,
            },
            sync_meta: StampMeta::default(),
        }
    }

    #[tokio::test]
    async fn test_fanout_to_every_sink() {
        let (tx, rx) = async_channel::bounded(10);

        let handles = vec![
            SinkHandle::spawn(LogSink::new("first"), 10),
            SinkHandle::spawn(LogSink::new("second"), 10),
        ];
        let dispatcher = Dispatcher::with_handles(handles, rx);
        let running = dispatcher.spawn();

        for i in 0..5 {
            tx.send(frame(i)).await.unwrap();
        }
        drop(tx);
        running.await.unwrap();
    }

    #[tokio::test]
    async fn test_create_from_sink_configs() {
        let (tx, rx) = async_channel::bounded(10);

        let configs = vec![SinkConfig {
            name: "console".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 50,
            params: HashMap::new(),
        }];
        let dispatcher = create_dispatcher(configs, rx).await.unwrap();
        assert_eq!(dispatcher.metrics().len(), 1);
        let running = dispatcher.spawn();

        tx.send(frame(1)).await.unwrap();
        drop(tx);
        running.await.unwrap();
    }
}
