//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are wall-clock seconds since the UNIX epoch (f64)
//! - `trigger_time` carries the external time reference; `delivery_time` is stamped
//!   locally when a frame event enters the process

mod blueprint;
mod camera_id;
mod clock;
mod error;
mod frame;
mod sink;
mod stamped;
mod sync_tuning;
mod trigger;

pub use blueprint::*;
pub use camera_id::CameraId;
pub use clock::wall_clock;
pub use error::*;
pub use frame::*;
pub use sink::*;
pub use stamped::*;
pub use sync_tuning::*;
pub use trigger::*;
