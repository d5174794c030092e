//! `Gripper` trait for the parallel-jaw gripper.

use locobot_types::LocoError;

/// A two-state gripper.
pub trait Gripper: Send {
    /// Stable identifier, e.g. `"gripper"`.
    fn id(&self) -> &str;

    /// Open the fingers, releasing anything held.
    fn open(&mut self) -> Result<(), LocoError>;

    /// Close the fingers on whatever is between them.
    fn close(&mut self) -> Result<(), LocoError>;

    /// `true` while the fingers are closed.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockGripper {
        closed: bool,
    }

    impl Gripper for MockGripper {
        fn id(&self) -> &str {
            "gripper"
        }

        fn open(&mut self) -> Result<(), LocoError> {
            self.closed = false;
            Ok(())
        }

        fn close(&mut self) -> Result<(), LocoError> {
            self.closed = true;
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }

    #[test]
    fn mock_gripper_toggle() {
        let mut gripper = MockGripper { closed: false };
        gripper.close().unwrap();
        assert!(gripper.is_closed());
        gripper.open().unwrap();
        assert!(!gripper.is_closed());
    }
}
