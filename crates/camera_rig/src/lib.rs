//! # Camera Rig
//!
//! Camera device layer.
//!
//! Responsibilities:
//! - Drive the capture device behind the `CameraControl` trait
//! - Own bring-up and ordered teardown (`CameraSession`)
//! - Bounded trigger enable handshake at startup
//! - Provide simulated (`MockRig`) and recorded (`ReplayRig`) devices

pub mod control;
pub mod error;
pub mod mock_rig;
pub mod replay_rig;
pub mod session;

pub use contracts::{CameraDescriptor, FrameCallback, TriggerSource, TriggerSwitch};
pub use control::CameraControl;
pub use error::{Result, RigError};
pub use mock_rig::{MockCamera, MockRig, MockRigConfig, MockTriggerSource, MockTriggerSwitch};
pub use replay_rig::{ReplayCamera, ReplayRig, ReplayRigConfig, ReplayTriggerSource, ReplayTriggerSwitch};
pub use session::{CameraSession, SessionCommand, SessionHandle};
