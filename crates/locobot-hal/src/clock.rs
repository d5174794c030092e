//! Blocking sleep primitive.
//!
//! The control loop waits through a [`Clock`] so tests can run without
//! real delays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A source of blocking waits.
pub trait Clock: Send {
    fn sleep(&mut self, duration: Duration);
}

/// Wall-clock sleeping via [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Test clock that returns immediately and records every requested wait.
///
/// Clones share the same log, so a test can keep one handle and move
/// another into the robot bundle.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Sum of all requested waits.
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn sleep(&mut self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}
