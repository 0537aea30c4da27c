//! Per-sink worker with its own bounded queue.
//!
//! Every sink gets a private mpsc queue and a dedicated task, so one slow
//! or failing sink can only drop its own frames, never stall the fan-out
//! or a sibling sink.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use contracts::{wall_clock, FrameSink, StampedFrame};

use crate::metrics::SinkMetrics;

/// Front end of one sink worker: the queue sender plus bookkeeping.
pub struct SinkHandle {
    name: String,
    queue: mpsc::Sender<StampedFrame>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Wrap `sink` in a worker task fed through a queue of `queue_capacity`.
    pub fn spawn<S: FrameSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let metrics = Arc::new(SinkMetrics::new(&name));
        let (queue, rx) = mpsc::channel(queue_capacity);

        let worker = tokio::spawn(drive_sink(sink, rx, Arc::clone(&metrics), name.clone()));

        Self {
            name,
            queue,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand a frame to the worker without waiting.
    ///
    /// A full queue drops the frame and counts it; the caller is the hot
    /// path and must not block on a lagging sink.
    pub fn try_send(&self, frame: StampedFrame) -> bool {
        let seq = frame.seq;
        match self.queue.try_send(frame) {
            Ok(()) => {
                let depth = self.queue.max_capacity() - self.queue.capacity();
                self.metrics.set_queue_len(depth);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_drop();
                warn!(sink = %self.name, seq, "sink queue full, frame dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, seq, "sink worker is gone, frame lost");
                false
            }
        }
    }

    /// Close the queue and wait for the worker to flush and exit.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "sink worker panicked");
        }
    }
}

/// Worker loop: drain the queue into the sink until the handle closes it.
async fn drive_sink<S: FrameSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<StampedFrame>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker running");

    while let Some(frame) = rx.recv().await {
        metrics.set_queue_len(rx.len());
        if let Err(e) = sink.write(&frame).await {
            metrics.record_failure();
            error!(sink = %name, seq = frame.seq, error = %e, "sink write failed");
            continue;
        }
        // Lag from the frame's resolved timestamp to sink completion
        let lag_ms = (wall_clock() - frame.timestamp) * 1000.0;
        metrics.record_write(lag_ms);
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush on shutdown failed");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close on shutdown failed");
    }

    debug!(sink = %name, "sink worker done");
}
