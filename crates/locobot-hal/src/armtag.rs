//! `ArmTag` trait for AR-tag based calibration.
//!
//! An AR tag mounted on the arm is detected by the camera; from its pose the
//! driver computes where the arm base sits relative to a reference frame on
//! the robot (the plate the arm is bolted to) and publishes that transform
//! into the frame tree so later perception queries can be answered in the
//! arm-base frame.

use locobot_perception::Transform3D;
use locobot_types::LocoError;

/// AR-tag transform estimator.
pub trait ArmTag: Send {
    /// Estimate and publish the reference-frame → arm-base transform.
    ///
    /// With `position_only` set, the published transform carries the
    /// estimated translation and an identity rotation.
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::Perception`] if the tag is not visible.
    fn find_ref_to_arm_base_transform(&mut self, position_only: bool) -> Result<Transform3D, LocoError>;
}
