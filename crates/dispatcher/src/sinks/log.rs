//! Tracing-backed sink, one summary line per frame.

use contracts::{ContractError, FrameSink, StampedFrame};
use tracing::info;

/// Writes frame summaries to the process log. Useful as the only sink in
/// dry runs and as a cheap liveness signal next to heavier sinks.
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl FrameSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, frame: &StampedFrame) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            seq = frame.seq,
            timestamp = frame.timestamp,
            camera = %frame.info.camera_id,
            source = ?frame.stamp_source,
            trigger_counter = frame.sync_meta.trigger_counter,
            latency_ms = frame.sync_meta.trigger_latency.map(|l| l * 1000.0),
            "stamped frame"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "log sink closed");
        Ok(())
    }
}
