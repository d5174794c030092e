//! `Arm` trait for the manipulator.
//!
//! Poses are given as end-effector components in the arm-base frame; the
//! driver owns inverse kinematics and trajectory execution.

use locobot_types::{EePose, LocoError};

/// A manipulator commanded in end-effector space.
pub trait Arm: Send {
    /// Stable identifier, e.g. `"mobile_wx250s"`.
    fn id(&self) -> &str;

    /// Move the end effector to `pose`, blocking until the motion completes.
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::MotionFailed`] if no joint solution reaches the
    /// pose or the motion cannot be executed.
    fn set_ee_pose_components(&mut self, pose: EePose) -> Result<(), LocoError>;

    /// Fold the arm into its stowed pose, clear of the camera.
    fn go_to_sleep_pose(&mut self) -> Result<(), LocoError>;
}
