//! # Dispatcher
//!
//! 打戳帧的出口层。
//!
//! 从同步引擎的输出通道消费 `StampedFrame`, 克隆扇出到每个 sink;
//! 每个 sink 挂在独立的有界队列和 worker 上, 慢 sink 只丢自己的帧。

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{FrameSink, StampedFrame};
pub use dispatcher::{Dispatcher, create_dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink, NetworkSink};
