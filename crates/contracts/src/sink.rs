//! Output contract for stamped frames.

use crate::{ContractError, StampedFrame};

/// Destination for stamped frames, driven by one dispatcher worker.
///
/// `write` is called once per frame in dispatch order; `flush` and
/// `close` run exactly once during shutdown, in that order.
#[trait_variant::make(FrameSink: Send)]
pub trait LocalFrameSink {
    /// Label used in logs and metric labels
    fn name(&self) -> &str;

    async fn write(&mut self, frame: &StampedFrame) -> Result<(), ContractError>;

    async fn flush(&mut self) -> Result<(), ContractError>;

    async fn close(&mut self) -> Result<(), ContractError>;
}
