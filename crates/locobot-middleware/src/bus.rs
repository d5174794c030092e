//! Typed, topic-based publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so every subscriber receives
//! every message and no subscriber can block a publisher.  The capacity of
//! each channel is the topic's queue depth (rounded up to a power of two by
//! Tokio): a subscriber that falls further behind loses the oldest
//! messages.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::CmdVel`] | Drive commands for the mobile base |
//! | [`Topic::Odometry`] | Base pose integrated from those commands |

use locobot_types::{Event, LocoError};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Queue depth used when none is configured.
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// Routing lanes on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    CmdVel,
    Odometry,
}

/// Shared bus.  Clone it cheaply – all clones share the same channels.
#[derive(Clone, Debug)]
pub struct TopicBus {
    cmd_vel: broadcast::Sender<Event>,
    odometry: broadcast::Sender<Event>,
}

impl TopicBus {
    /// Create a bus whose topics each buffer `queue_size` messages.
    ///
    /// A `queue_size` of zero is raised to one.
    pub fn new(queue_size: usize) -> Self {
        let queue_size = queue_size.max(1);
        let (cmd_vel, _) = broadcast::channel(queue_size);
        let (odometry, _) = broadcast::channel(queue_size);
        Self { cmd_vel, odometry }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of subscribers handed the event.  Publishing with
    /// nobody listening is not an error and returns `Ok(0)`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, LocoError> {
        self.publisher(topic).publish(event)
    }

    /// Subscribe to `topic`.  Only messages published after this call are
    /// delivered.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// A handle that can publish on `topic` only.
    pub fn publisher(&self, topic: Topic) -> TopicPublisher {
        TopicPublisher {
            topic,
            sender: self.sender(topic).clone(),
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::CmdVel => &self.cmd_vel,
            Topic::Odometry => &self.odometry,
        }
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishing half bound to a single [`Topic`].
///
/// Once every publisher and bus clone for a topic is dropped, its
/// subscribers observe the channel as closed.
#[derive(Clone, Debug)]
pub struct TopicPublisher {
    topic: Topic,
    sender: broadcast::Sender<Event>,
}

impl TopicPublisher {
    /// See [`TopicBus::publish_to`].
    pub fn publish(&self, event: Event) -> Result<usize, LocoError> {
        match self.sender.send(event) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(_)) => {
                trace!(topic = ?self.topic, "published with no subscribers");
                Ok(0)
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Receiving half bound to a single [`Topic`].
///
/// Obtained via [`TopicBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   messages were dropped.
    /// * `Err(RecvError::Closed)` – every publisher has gone away.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Blocking variant of [`recv`][Self::recv] for plain threads.
    ///
    /// Skips over lag, logging how many messages were lost, and returns
    /// `None` once the topic is closed.  Must not be called from inside an
    /// async runtime.
    pub fn blocking_next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged; oldest messages dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive of an already-queued event.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locobot_types::{DriveCommand, EventPayload};

    fn make_event(speed: f32) -> Event {
        Event::new("test", EventPayload::CmdVel(DriveCommand::forward(speed)))
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = TopicBus::default();
        assert_eq!(bus.publish_to(Topic::CmdVel, make_event(0.1)).unwrap(), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = TopicBus::default();
        let mut rx = bus.subscribe_to(Topic::CmdVel);
        let event = make_event(0.2);

        assert_eq!(bus.publish_to(Topic::CmdVel, event.clone())?, 1);
        let received = rx.recv().await?;
        assert_eq!(received.id, event.id);
        assert_eq!(rx.topic(), Topic::CmdVel);
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = TopicBus::default();
        let mut odom_rx = bus.subscribe_to(Topic::Odometry);
        let _cmd_rx = bus.subscribe_to(Topic::CmdVel);

        bus.publish_to(Topic::CmdVel, make_event(0.3)).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), odom_rx.recv()).await;
        assert!(result.is_err(), "odometry subscriber must not see cmd_vel traffic");
    }

    #[test]
    fn slow_subscriber_lags_past_queue_depth() {
        const DEPTH: usize = 8;
        let bus = TopicBus::new(DEPTH);
        let mut slow = bus.subscribe_to(Topic::CmdVel);
        for i in 0..(DEPTH + 5) {
            bus.publish_to(Topic::CmdVel, make_event(i as f32)).unwrap();
        }
        assert!(matches!(
            slow.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(5))
        ));
        // After the lag report the oldest surviving message is delivered.
        let next = slow.try_recv().unwrap();
        match next.payload {
            EventPayload::CmdVel(cmd) => assert_eq!(cmd.linear_x(), 5.0),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn queue_size_rounds_up_to_power_of_two() {
        let bus = TopicBus::new(DEFAULT_QUEUE_SIZE);
        let mut rx = bus.subscribe_to(Topic::CmdVel);
        for i in 0..16 {
            bus.publish_to(Topic::CmdVel, make_event(i as f32)).unwrap();
        }
        assert!(rx.try_recv().is_ok(), "16 messages fit a queue of 10");

        let mut rx = bus.subscribe_to(Topic::CmdVel);
        for i in 0..17 {
            bus.publish_to(Topic::CmdVel, make_event(i as f32)).unwrap();
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
    }

    #[test]
    fn blocking_next_returns_none_once_publishers_drop() {
        let bus = TopicBus::new(4);
        let mut rx = bus.subscribe_to(Topic::Odometry);
        let publisher = bus.publisher(Topic::Odometry);
        drop(bus);
        publisher.publish(make_event(1.0)).unwrap();
        drop(publisher);
        assert!(rx.blocking_next().is_some());
        assert!(rx.blocking_next().is_none());
    }

    #[test]
    fn zero_queue_size_is_raised_to_one() {
        let bus = TopicBus::new(0);
        let mut rx = bus.subscribe_to(Topic::CmdVel);
        bus.publish_to(Topic::CmdVel, make_event(0.1)).unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
