//! `locobot-hal` – capability seams of the Locobot.
//!
//! The control loop never talks to a driver directly.  It holds a
//! [`Locobot`] bundle of trait objects, one per capability, so the physical
//! robot, the simulator and test doubles are interchangeable.
//!
//! # Modules
//!
//! - [`arm`] – [`Arm`]: end-effector pose commands and named poses.
//! - [`gripper`] – [`Gripper`]: open / close.
//! - [`camera`] – [`PanTilt`]: camera pan/tilt servos.
//! - [`armtag`] – [`ArmTag`]: AR-tag based arm-base calibration.
//! - [`pointcloud`] – [`ClusterSource`]: segmented object positions.
//! - [`base`] – [`VelocityPublisher`]: drive commands for the mobile base.
//! - [`clock`] – [`Clock`]: blocking sleep primitive.
//! - [`registry`] – [`Locobot`] and [`LocobotBuilder`].
//! - [`sim`] – in-process simulated robot for headless runs and tests.

pub mod arm;
pub mod armtag;
pub mod base;
pub mod camera;
pub mod clock;
pub mod gripper;
pub mod pointcloud;
pub mod registry;
pub mod sim;

pub use arm::Arm;
pub use armtag::ArmTag;
pub use base::VelocityPublisher;
pub use camera::PanTilt;
pub use clock::{Clock, ManualClock, SystemClock};
pub use gripper::Gripper;
pub use pointcloud::ClusterSource;
pub use registry::{Locobot, LocobotBuilder};
