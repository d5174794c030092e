//! `VelocityPublisher` trait for the mobile base.

use locobot_types::{DriveCommand, LocoError};

/// Outbound channel for base velocity commands.
pub trait VelocityPublisher: Send {
    /// Topic name the commands are delivered on, e.g. `"/mobile_base/cmd_vel"`.
    fn topic(&self) -> &str;

    /// Hand `cmd` to the transport.  Does not wait for the base to move.
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::Transport`] if the transport has shut down.
    fn publish(&mut self, cmd: DriveCommand) -> Result<(), LocoError>;
}
