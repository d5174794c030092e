//! `PanTilt` trait for the camera mount.

use locobot_types::LocoError;

/// Pan/tilt servos carrying the depth camera.
pub trait PanTilt: Send {
    /// Stable identifier, e.g. `"camera"`.
    fn id(&self) -> &str;

    /// Move both servos, blocking until they arrive.  Angles are in radians;
    /// positive tilt points the camera down.
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::Hardware`] if either angle is outside the servo
    /// limits.
    fn pan_tilt_move(&mut self, pan: f32, tilt: f32) -> Result<(), LocoError>;

    /// Last commanded `(pan, tilt)`.
    fn pan_tilt(&self) -> (f32, f32);
}
