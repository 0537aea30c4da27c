//! # Acquisition
//!
//! Device-to-pipeline bridging.
//!
//! Responsibilities:
//! - Bridge the pulse source callback into the trigger queue (`TriggerFeed`)
//! - Bridge the camera delivery callback into a bounded frame channel
//!   (`CaptureFeed`), dropping the newest frame under backpressure
//! - Run the pairing loop that resolves frames against pulses (`FramePump`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use acquisition::{AcquisitionPipeline, BackpressureConfig, FramePump};
//! use sync_engine::TriggerQueue;
//!
//! let (producer, consumer) = TriggerQueue::with_slots(tuning.queue_slots);
//! let mut pipeline = AcquisitionPipeline::new(
//!     "cam_main", trigger_source, producer, BackpressureConfig::default(),
//! );
//!
//! camera.attach_frame_callback(pipeline.frame_callback());
//! let frames = pipeline.take_frame_stream()?;
//! pipeline.start();
//!
//! let pump = FramePump::new(correlator, frames, dispatch_tx, pipeline.metrics());
//! pump.run(shutdown).await?;
//! ```

mod capture_feed;
mod config;
mod error;
mod pipeline;
mod trigger_feed;

// Re-exports
pub use capture_feed::CaptureFeed;
pub use config::{AcquisitionMetrics, BackpressureConfig, MetricsSnapshot};
pub use contracts::CaptureEvent;
pub use error::{AcquisitionError, Result};
pub use pipeline::{AcquisitionPipeline, FramePump};
pub use trigger_feed::TriggerFeed;
