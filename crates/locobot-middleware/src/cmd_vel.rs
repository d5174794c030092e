//! Drive-command transport.
//!
//! [`CmdVelPublisher`] stamps each [`DriveCommand`] into an [`Event`] and
//! publishes it on [`Topic::CmdVel`].  [`spawn_sim_base`] is the matching
//! consumer for headless runs: a thread that feeds every command into a
//! [`SimBase`] integrator and republishes the resulting pose on
//! [`Topic::Odometry`].

use std::thread::JoinHandle;

use locobot_hal::VelocityPublisher;
use locobot_hal::sim::SimBase;
use locobot_types::{DriveCommand, Event, EventPayload, LocoError, Odometry};
use tracing::{debug, info};

use crate::bus::{Topic, TopicBus, TopicPublisher};

const SOURCE: &str = "locobot-middleware::cmd_vel";

/// Bus-backed [`VelocityPublisher`].
pub struct CmdVelPublisher {
    topic_name: String,
    publisher: TopicPublisher,
}

impl CmdVelPublisher {
    /// Publish on `bus` under the external topic name `topic_name`
    /// (e.g. `"/mobile_base/cmd_vel"`).
    pub fn new(bus: &TopicBus, topic_name: impl Into<String>) -> Self {
        Self {
            topic_name: topic_name.into(),
            publisher: bus.publisher(Topic::CmdVel),
        }
    }
}

impl VelocityPublisher for CmdVelPublisher {
    fn topic(&self) -> &str {
        &self.topic_name
    }

    fn publish(&mut self, cmd: DriveCommand) -> Result<(), LocoError> {
        let delivered = self
            .publisher
            .publish(Event::new(SOURCE, EventPayload::CmdVel(cmd)))?;
        debug!(
            topic = %self.topic_name,
            linear_x = cmd.linear_x(),
            angular_z = cmd.angular_z(),
            delivered,
            "drive command published"
        );
        Ok(())
    }
}

/// Start a thread that integrates every command on [`Topic::CmdVel`] for
/// `dt` seconds and publishes the resulting [`Odometry`].
///
/// The thread exits, returning the final pose, once every publisher on the
/// command topic (including `bus` and its clones) has been dropped.
pub fn spawn_sim_base(bus: &TopicBus, dt: f32) -> JoinHandle<Odometry> {
    let mut commands = bus.subscribe_to(Topic::CmdVel);
    let odometry = bus.publisher(Topic::Odometry);
    std::thread::spawn(move || {
        let mut base = SimBase::new();
        while let Some(event) = commands.blocking_next() {
            if let EventPayload::CmdVel(cmd) = event.payload {
                let pose = base.apply(&cmd, dt);
                debug!(x = pose.x, y = pose.y, heading = pose.heading_rad, "sim base moved");
                // No odometry listeners is fine.
                let _ = odometry.publish(Event::new("locobot-middleware::sim_base", EventPayload::Odometry(pose)));
            }
        }
        let pose = base.odometry();
        info!(x = pose.x, y = pose.y, heading = pose.heading_rad, "sim base stopped");
        pose
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_stamps_commands_onto_bus() {
        let bus = TopicBus::default();
        let mut rx = bus.subscribe_to(Topic::CmdVel);
        let mut publisher = CmdVelPublisher::new(&bus, "/mobile_base/cmd_vel");
        assert_eq!(publisher.topic(), "/mobile_base/cmd_vel");

        publisher.publish(DriveCommand::rotate(-1.5)).unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.source, SOURCE);
        match event.payload {
            EventPayload::CmdVel(cmd) => assert_eq!(cmd, DriveCommand::rotate(-1.5)),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn publishing_without_a_base_listening_succeeds() {
        let bus = TopicBus::default();
        let mut publisher = CmdVelPublisher::new(&bus, "/cmd_vel");
        assert!(publisher.publish(DriveCommand::forward(0.2)).is_ok());
    }

    #[test]
    fn sim_base_integrates_commands_and_stops_when_publishers_drop() {
        let bus = TopicBus::default();
        let mut odom_rx = bus.subscribe_to(Topic::Odometry);
        let handle = spawn_sim_base(&bus, 1.0);
        let mut publisher = CmdVelPublisher::new(&bus, "/cmd_vel");

        publisher.publish(DriveCommand::forward(0.25)).unwrap();
        publisher.publish(DriveCommand::forward(0.25)).unwrap();
        drop(publisher);
        drop(bus);

        let final_pose = handle.join().expect("sim base thread panicked");
        assert!((final_pose.x - 0.5).abs() < 1e-5);

        let mut poses = 0;
        while odom_rx.blocking_next().is_some() {
            poses += 1;
        }
        assert_eq!(poses, 2);
    }
}
