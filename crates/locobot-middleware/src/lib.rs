//! `locobot-middleware` – message transport between the control loop and
//! the mobile base.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe bus built on Tokio
//!   broadcast channels; the channel capacity is the topic's queue depth.
//! - [`cmd_vel`] – [`CmdVelPublisher`], the bus-backed
//!   [`VelocityPublisher`][locobot_hal::VelocityPublisher], and
//!   [`spawn_sim_base`], a consumer thread that drives the simulated base.

pub mod bus;
pub mod cmd_vel;

pub use bus::{DEFAULT_QUEUE_SIZE, Topic, TopicBus, TopicPublisher, TopicReceiver};
pub use cmd_vel::{CmdVelPublisher, spawn_sim_base};
