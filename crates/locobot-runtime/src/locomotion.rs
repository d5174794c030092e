//! Random locomotion between pick cycles.
//!
//! Each cycle draws a magnitude `m` uniformly from `[0.0, 0.5)` and a
//! selector uniformly from `{0, 1, 2, 3}`:
//!
//! | selector | command |
//! |---|---|
//! | 0 | forward at `m` m/s |
//! | 1 | rotate at `+10·m` rad/s |
//! | 2, 3 | rotate at `-10·m` rad/s |
//!
//! Two selector values share the clockwise branch, so clockwise turns are
//! twice as likely as either other move.
//!
//! # Example
//!
//! ```rust
//! use locobot_runtime::locomotion::{drive_command, Locomotion};
//!
//! assert_eq!(drive_command(0.2, 0).linear_x(), 0.2);
//!
//! let mut locomotion = Locomotion::seeded(7);
//! let cmd = locomotion.next_command();
//! assert!(cmd.linear_x() == 0.0 || cmd.angular_z() == 0.0);
//! ```

use locobot_types::DriveCommand;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) of the random magnitude.
pub const MAX_MAGNITUDE: f32 = 0.5;
/// Angular rate per unit magnitude for turning moves.
pub const TURN_GAIN: f32 = 10.0;
/// Number of selector outcomes.
pub const SELECTOR_COUNT: u8 = 4;

/// Map a magnitude and selector to a command.  Any selector above 1 takes
/// the clockwise branch.
pub fn drive_command(magnitude: f32, selector: u8) -> DriveCommand {
    match selector {
        0 => DriveCommand::forward(magnitude),
        1 => DriveCommand::rotate(magnitude * TURN_GAIN),
        _ => DriveCommand::rotate(-magnitude * TURN_GAIN),
    }
}

/// Source of random drive commands.
#[derive(Debug, Clone)]
pub struct Locomotion<R: Rng> {
    rng: R,
}

impl Locomotion<StdRng> {
    /// Reproducible sequence for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> Locomotion<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw `(magnitude, selector)`.
    pub fn sample(&mut self) -> (f32, u8) {
        let magnitude = self.rng.gen_range(0.0..MAX_MAGNITUDE);
        let selector = self.rng.gen_range(0..SELECTOR_COUNT);
        (magnitude, selector)
    }

    /// Draw and map the next command.
    pub fn next_command(&mut self) -> DriveCommand {
        let (magnitude, selector) = self.sample();
        drive_command(magnitude, selector)
    }
}
