use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A 3-D vector in metres (positions) or m/s and rad/s (velocities).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Euclidean length.
    pub fn norm(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component along `axis`.
    pub fn along(self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Cartesian axis selector used for sorting perception results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

/// An object detected by point-cloud segmentation.
///
/// `position` is the cluster centroid expressed in whatever reference frame
/// the query asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Service-assigned label, e.g. `"cluster_1"`.
    pub name: String,
    pub position: Vec3,
    /// Number of points that make up the cluster.
    pub num_points: u32,
    /// Mean RGB colour of the cluster's points.
    pub color: [u8; 3],
    /// Yaw of the cluster's principal axis in radians.
    pub yaw: f32,
}

impl Cluster {
    /// A cluster carrying only a position; the remaining metadata is zeroed.
    pub fn at(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            num_points: 0,
            color: [0, 0, 0],
            yaw: 0.0,
        }
    }
}

/// Parameters for a cluster-position request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterQuery {
    /// Frame the returned positions are expressed in.
    pub ref_frame: String,
    /// Axis the results are sorted on.
    pub sort_axis: Axis,
    /// `true` sorts descending.
    pub reverse: bool,
}

/// End-effector pose target, expressed as individual components in the
/// arm-base frame.
///
/// Components that are not set default to zero, and `yaw` defaults to
/// "let the solver choose", mirroring how a pose is commanded on the
/// physical arm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EePose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: Option<f32>,
    /// Seconds the motion should take; `None` uses the arm's default profile.
    pub moving_time: Option<f32>,
    /// Seconds spent accelerating; `None` uses the arm's default profile.
    pub accel_time: Option<f32>,
}

impl EePose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn x(mut self, x: f32) -> Self {
        self.x = x;
        self
    }

    pub fn y(mut self, y: f32) -> Self {
        self.y = y;
        self
    }

    pub fn z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn moving_time(mut self, secs: f32) -> Self {
        self.moving_time = Some(secs);
        self
    }

    /// Target end-effector position.
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Base velocity intent in the `geometry_msgs/Twist` layout.
///
/// The locomotion step only ever sets `linear.x` (forward) or `angular.z`
/// (turn); all other components stay zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl DriveCommand {
    /// Drive straight ahead at `speed` m/s.
    pub fn forward(speed: f32) -> Self {
        Self {
            linear: Vec3::new(speed, 0.0, 0.0),
            angular: Vec3::zero(),
        }
    }

    /// Rotate in place at `rate` rad/s (positive is counter-clockwise).
    pub fn rotate(rate: f32) -> Self {
        Self {
            linear: Vec3::zero(),
            angular: Vec3::new(0.0, 0.0, rate),
        }
    }

    pub fn linear_x(&self) -> f32 {
        self.linear.x
    }

    pub fn angular_z(&self) -> f32 {
        self.angular.z
    }
}

/// Planar base pose integrated from drive commands.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Odometry {
    pub x: f32,
    pub y: f32,
    pub heading_rad: f32,
}

/// Envelope for every message carried on the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "locobot-runtime::pick_place"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the topic bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    CmdVel(DriveCommand),
    Odometry(Odometry),
}

/// Error type shared by every capability and by the control loop.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocoError {
    #[error("Motion failed on {component}: {details}")]
    MotionFailed { component: String, details: String },

    #[error("Hardware Fault on {component}: {details}")]
    Hardware { component: String, details: String },

    #[error("Perception Error: {0}")]
    Perception(String),

    #[error("Transform Error: {0}")]
    Transform(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("I/O Error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_command_serializes_as_twist() {
        let cmd = DriveCommand::rotate(-2.5);
        let json = serde_json::to_value(cmd).unwrap();
        assert_eq!(json["linear"]["x"], 0.0);
        assert_eq!(json["angular"]["z"], -2.5);
        assert_eq!(json["angular"]["x"], 0.0);
    }

    #[test]
    fn drive_command_constructors_set_one_component() {
        let fwd = DriveCommand::forward(0.3);
        assert!((fwd.linear_x() - 0.3).abs() < f32::EPSILON);
        assert_eq!(fwd.angular_z(), 0.0);

        let turn = DriveCommand::rotate(1.0);
        assert_eq!(turn.linear_x(), 0.0);
        assert!((turn.angular_z() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn ee_pose_defaults_unset_components_to_zero() {
        let pose = EePose::new().y(0.3).z(0.2);
        assert_eq!(pose.x, 0.0);
        assert_eq!(pose.pitch, 0.0);
        assert!(pose.yaw.is_none());
        assert!(pose.moving_time.is_none());
        assert_eq!(pose.position(), Vec3::new(0.0, 0.3, 0.2));
    }

    #[test]
    fn vec3_along_axis() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.along(Axis::X), 1.0);
        assert_eq!(v.along(Axis::Y), 2.0);
        assert_eq!(v.along(Axis::Z), 3.0);
        assert!((Vec3::new(3.0, 4.0, 0.0).norm() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn axis_deserializes_lowercase() {
        let axis: Axis = serde_json::from_str("\"y\"").unwrap();
        assert_eq!(axis, Axis::Y);
        assert_eq!(axis.to_string(), "y");
    }

    #[test]
    fn event_wraps_payload_with_fresh_id() {
        let a = Event::new("test", EventPayload::CmdVel(DriveCommand::forward(0.1)));
        let b = Event::new("test", EventPayload::CmdVel(DriveCommand::forward(0.1)));
        assert_ne!(a.id, b.id);
        assert_eq!(a.source, "test");
    }

    #[test]
    fn loco_error_display() {
        let err = LocoError::MotionFailed {
            component: "arm".to_string(),
            details: "no valid pose".to_string(),
        };
        assert!(err.to_string().contains("arm"));
        assert!(LocoError::Perception("boom".into())
            .to_string()
            .contains("Perception Error"));
    }
}
