//! In-process simulated Locobot for headless runs and tests.
//!
//! Every simulated driver shares one [`SimWorld`]: a table of objects, the
//! arm's end-effector position, what the gripper holds, the virtual basket
//! and the frame tree.  Grasping uses the ground-truth arm mount, while the
//! point cloud answers queries through the *estimated* frame tree, so
//! perception only works in the arm-base frame after the AR-tag calibration
//! has published its transform, the same way it does on the robot.
//!
//! The simulated point cloud only re-segments the table every
//! `refresh_every` queries; in between it replays its last snapshot, which
//! reproduces the ghost detections of an unrefreshed cloud.
//!
//! # Example
//!
//! ```rust
//! use locobot_hal::sim::{RecordingPublisher, SimLocobot};
//! use locobot_hal::ManualClock;
//! use locobot_types::Vec3;
//!
//! let (builder, world) = SimLocobot::new()
//!     .with_object("block", Vec3::new(0.35, 0.05, 0.02))
//!     .into_parts();
//! let bot = builder
//!     .base(Box::new(RecordingPublisher::new("/mobile_base/cmd_vel")))
//!     .clock(Box::new(ManualClock::new()))
//!     .build()
//!     .expect("sim locobot must build");
//! assert_eq!(world.lock().unwrap().table().len(), 1);
//! # drop(bot);
//! ```

use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};

use locobot_perception::{Quaternion, TfEngine, Transform3D, sort_clusters};
use locobot_types::{Cluster, ClusterQuery, DriveCommand, EePose, LocoError, Odometry, Vec3};
use tracing::debug;

use crate::arm::Arm;
use crate::armtag::ArmTag;
use crate::base::VelocityPublisher;
use crate::camera::PanTilt;
use crate::gripper::Gripper;
use crate::pointcloud::ClusterSource;
use crate::registry::LocobotBuilder;

pub const BASE_FRAME: &str = "locobot/base_link";
pub const PLATE_FRAME: &str = "locobot/plate_link";
pub const ARM_BASE_FRAME: &str = "locobot/arm_base_link";
pub const CAMERA_FRAME: &str = "locobot/camera_link";

/// Furthest end-effector target (metres from the arm base) the simulated
/// arm can reach.
pub const ARM_REACH: f32 = 0.65;
/// Objects whose centre is this close to the closing fingers get picked up.
pub const GRASP_RADIUS: f32 = 0.03;
/// The camera must tilt down at least this far to see the AR tag.
pub const MIN_TAG_TILT: f32 = 0.5;
/// The camera must tilt down at least this far to see the table.
pub const MIN_TABLE_TILT: f32 = 0.3;

const PAN_LIMIT: f32 = PI;
const TILT_MIN: f32 = -1.0;
const TILT_MAX: f32 = 1.3;

// ────────────────────────────────────────────────────────────────────────────
// World
// ────────────────────────────────────────────────────────────────────────────

/// A table-top object, positioned in `locobot/base_link`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimObject {
    pub name: String,
    pub position: Vec3,
    pub color: [u8; 3],
    pub num_points: u32,
}

/// State shared by all simulated drivers.
#[derive(Debug)]
pub struct SimWorld {
    tf: TfEngine,
    plate_mount: Transform3D,
    arm_mount: Transform3D,
    table: Vec<SimObject>,
    held: Option<SimObject>,
    basket: Vec<SimObject>,
    ee: Option<Vec3>,
    pan_tilt: (f32, f32),
    motions: Vec<EePose>,
}

/// Handle every simulated driver holds.
pub type SharedWorld = Arc<Mutex<SimWorld>>;

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// Empty table, arm asleep, camera level.
    pub fn new() -> Self {
        let plate_mount = Transform3D::new(Vec3::new(0.0, 0.0, 0.08), Quaternion::identity());
        let arm_mount = Transform3D::new(Vec3::new(0.09, 0.0, 0.02), Quaternion::identity());
        let mut tf = TfEngine::new();
        tf.set_transform(BASE_FRAME, PLATE_FRAME, plate_mount);
        tf.set_transform(BASE_FRAME, CAMERA_FRAME, camera_mount(0.0, 0.0));
        Self {
            tf,
            plate_mount,
            arm_mount,
            table: Vec::new(),
            held: None,
            basket: Vec::new(),
            ee: None,
            pan_tilt: (0.0, 0.0),
            motions: Vec::new(),
        }
    }

    /// Estimated frame tree, as published by the drivers.
    pub fn tf(&self) -> &TfEngine {
        &self.tf
    }

    /// Objects still on the table.
    pub fn table(&self) -> &[SimObject] {
        &self.table
    }

    /// Objects dropped into the virtual basket, in drop order.
    pub fn basket(&self) -> &[SimObject] {
        &self.basket
    }

    pub fn held(&self) -> Option<&SimObject> {
        self.held.as_ref()
    }

    /// End-effector position in the arm-base frame; `None` while asleep.
    pub fn ee(&self) -> Option<Vec3> {
        self.ee
    }

    /// Every end-effector pose commanded so far.
    pub fn motions(&self) -> &[EePose] {
        &self.motions
    }

    /// Place an object given in the arm-base frame.
    pub fn place_object(&mut self, name: impl Into<String>, arm_frame_position: Vec3) {
        let position = self.base_to_arm().apply(arm_frame_position);
        let index = self.table.len() as u32;
        self.table.push(SimObject {
            name: name.into(),
            position,
            color: [200, 40 + (index * 50 % 200) as u8, 40],
            num_points: 400 + index * 25,
        });
    }

    /// Ground-truth pose of the arm base in `locobot/base_link`.
    fn base_to_arm(&self) -> Transform3D {
        self.plate_mount.compose(self.arm_mount)
    }

    fn true_arm_frame(&self, base_position: Vec3) -> Vec3 {
        self.base_to_arm().inverse().apply(base_position)
    }
}

fn camera_mount(pan: f32, tilt: f32) -> Transform3D {
    Transform3D::new(Vec3::new(0.05, 0.0, 0.55), Quaternion::from_rpy(0.0, tilt, pan))
}

fn lock<'a>(world: &'a SharedWorld, component: &str) -> Result<MutexGuard<'a, SimWorld>, LocoError> {
    world.lock().map_err(|_| LocoError::Hardware {
        component: component.to_string(),
        details: "simulated world lock poisoned".to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Arm
// ────────────────────────────────────────────────────────────────────────────

/// Reach-limited arm.  Targets further than [`ARM_REACH`] from the arm base
/// fail with [`LocoError::MotionFailed`].
pub struct SimArm {
    id: String,
    world: SharedWorld,
}

impl SimArm {
    pub fn new(id: impl Into<String>, world: SharedWorld) -> Box<Self> {
        Box::new(Self { id: id.into(), world })
    }
}

impl Arm for SimArm {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_ee_pose_components(&mut self, pose: EePose) -> Result<(), LocoError> {
        let target = pose.position();
        if target.norm() > ARM_REACH {
            return Err(LocoError::MotionFailed {
                component: self.id.clone(),
                details: format!(
                    "no valid pose found for x={:.3} y={:.3} z={:.3}",
                    target.x, target.y, target.z
                ),
            });
        }
        let mut world = lock(&self.world, &self.id)?;
        world.ee = Some(target);
        world.motions.push(pose);
        debug!(arm = %self.id, x = target.x, y = target.y, z = target.z, pitch = pose.pitch, "sim arm moved");
        Ok(())
    }

    fn go_to_sleep_pose(&mut self) -> Result<(), LocoError> {
        lock(&self.world, &self.id)?.ee = None;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gripper
// ────────────────────────────────────────────────────────────────────────────

/// Gripper that picks up the table object under the fingers on close and
/// drops what it holds into the basket on open.
pub struct SimGripper {
    world: SharedWorld,
    closed: bool,
}

impl SimGripper {
    pub fn new(world: SharedWorld) -> Box<Self> {
        Box::new(Self { world, closed: false })
    }
}

impl Gripper for SimGripper {
    fn id(&self) -> &str {
        "gripper"
    }

    fn open(&mut self) -> Result<(), LocoError> {
        let mut world = lock(&self.world, "gripper")?;
        if let Some(object) = world.held.take() {
            debug!(object = %object.name, "sim gripper released object into basket");
            world.basket.push(object);
        }
        self.closed = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), LocoError> {
        let mut world = lock(&self.world, "gripper")?;
        self.closed = true;
        if world.held.is_some() {
            return Ok(());
        }
        let Some(ee) = world.ee else {
            return Ok(());
        };
        let hit = world
            .table
            .iter()
            .position(|o| world.true_arm_frame(o.position).sub(ee).norm() <= GRASP_RADIUS);
        match hit {
            Some(index) => {
                let object = world.table.remove(index);
                debug!(object = %object.name, "sim gripper grasped object");
                world.held = Some(object);
            }
            None => debug!("sim gripper closed on nothing"),
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// Pan/tilt mount that keeps the camera frame in the tree up to date.
pub struct SimPanTilt {
    world: SharedWorld,
    pan_tilt: (f32, f32),
}

impl SimPanTilt {
    pub fn new(world: SharedWorld) -> Box<Self> {
        Box::new(Self { world, pan_tilt: (0.0, 0.0) })
    }
}

impl PanTilt for SimPanTilt {
    fn id(&self) -> &str {
        "camera"
    }

    fn pan_tilt_move(&mut self, pan: f32, tilt: f32) -> Result<(), LocoError> {
        if pan.abs() > PAN_LIMIT || !(TILT_MIN..=TILT_MAX).contains(&tilt) {
            return Err(LocoError::Hardware {
                component: "camera".to_string(),
                details: format!("pan={pan:.3} tilt={tilt:.3} outside servo limits"),
            });
        }
        let mut world = lock(&self.world, "camera")?;
        world.pan_tilt = (pan, tilt);
        world.tf.set_transform(BASE_FRAME, CAMERA_FRAME, camera_mount(pan, tilt));
        self.pan_tilt = (pan, tilt);
        Ok(())
    }

    fn pan_tilt(&self) -> (f32, f32) {
        self.pan_tilt
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AR tag
// ────────────────────────────────────────────────────────────────────────────

/// Estimator that "sees" the tag whenever the arm is raised and the camera
/// looks down far enough, and publishes `plate_link → arm_base_link`.
pub struct SimArmTag {
    world: SharedWorld,
}

impl SimArmTag {
    pub fn new(world: SharedWorld) -> Box<Self> {
        Box::new(Self { world })
    }
}

impl ArmTag for SimArmTag {
    fn find_ref_to_arm_base_transform(&mut self, position_only: bool) -> Result<Transform3D, LocoError> {
        let mut world = lock(&self.world, "armtag")?;
        if world.ee.is_none() || world.pan_tilt.1 < MIN_TAG_TILT {
            return Err(LocoError::Perception("AR tag not visible to the camera".to_string()));
        }
        let estimate = if position_only {
            world.arm_mount.position_only()
        } else {
            world.arm_mount
        };
        world.tf.set_transform(PLATE_FRAME, ARM_BASE_FRAME, estimate);
        Ok(estimate)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Point cloud
// ────────────────────────────────────────────────────────────────────────────

/// Segmenter over the simulated table with a lagging refresh.
pub struct SimPointCloud {
    world: SharedWorld,
    refresh_every: u32,
    queries: u64,
    snapshot: Vec<SimObject>,
}

impl SimPointCloud {
    /// `refresh_every` of 1 re-segments on every query; 0 is treated as 1.
    pub fn new(world: SharedWorld, refresh_every: u32) -> Box<Self> {
        Box::new(Self {
            world,
            refresh_every: refresh_every.max(1),
            queries: 0,
            snapshot: Vec::new(),
        })
    }
}

impl ClusterSource for SimPointCloud {
    fn get_cluster_positions(&mut self, query: &ClusterQuery) -> Result<Option<Vec<Cluster>>, LocoError> {
        let world = lock(&self.world, "pcl")?;
        if self.queries % u64::from(self.refresh_every) == 0 {
            self.snapshot = world.table.clone();
        }
        self.queries += 1;

        if world.pan_tilt.1 < MIN_TABLE_TILT {
            return Ok(Some(Vec::new()));
        }

        let mut clusters = self
            .snapshot
            .iter()
            .map(|o| -> Result<Cluster, LocoError> {
                let position = world.tf.transform_point(&query.ref_frame, BASE_FRAME, o.position)?;
                Ok(Cluster {
                    name: String::new(),
                    position,
                    num_points: o.num_points,
                    color: o.color,
                    yaw: 0.0,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        sort_clusters(&mut clusters, query.sort_axis, query.reverse);
        for (i, cluster) in clusters.iter_mut().enumerate() {
            cluster.name = format!("cluster_{}", i + 1);
        }
        Ok(Some(clusters))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Base
// ────────────────────────────────────────────────────────────────────────────

/// Unicycle integrator standing in for the mobile base's motor controller.
#[derive(Debug, Default, Clone)]
pub struct SimBase {
    odom: Odometry,
}

impl SimBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive with `cmd` for `dt` seconds and return the new pose.
    pub fn apply(&mut self, cmd: &DriveCommand, dt: f32) -> Odometry {
        let heading = self.odom.heading_rad;
        self.odom.x += cmd.linear_x() * heading.cos() * dt;
        self.odom.y += cmd.linear_x() * heading.sin() * dt;
        self.odom.heading_rad = wrap_angle(heading + cmd.angular_z() * dt);
        self.odom
    }

    pub fn odometry(&self) -> Odometry {
        self.odom
    }
}

fn wrap_angle(a: f32) -> f32 {
    let wrapped = (a + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI { PI } else { wrapped }
}

/// Publisher that keeps every command instead of sending it.  Clones share
/// the same log.
#[derive(Debug, Clone)]
pub struct RecordingPublisher {
    topic: String,
    sent: Arc<Mutex<Vec<DriveCommand>>>,
}

impl RecordingPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every command published so far.
    pub fn sent(&self) -> Vec<DriveCommand> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl VelocityPublisher for RecordingPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&mut self, cmd: DriveCommand) -> Result<(), LocoError> {
        self.sent
            .lock()
            .map_err(|_| LocoError::Transport("recording log poisoned".to_string()))?
            .push(cmd);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimLocobot builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder that wires simulated arm, gripper, camera, AR tag and point
/// cloud around one [`SimWorld`].
///
/// The base publisher and clock are left to the caller, since they decide
/// whether commands go onto a real topic bus and whether waits are real.
pub struct SimLocobot {
    world: SimWorld,
    arm_model: String,
    refresh_every: u32,
}

impl Default for SimLocobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLocobot {
    pub fn new() -> Self {
        Self {
            world: SimWorld::new(),
            arm_model: "mobile_wx250s".to_string(),
            refresh_every: 1,
        }
    }

    /// Identifier reported by the simulated arm.
    pub fn with_arm_model(mut self, arm_model: impl Into<String>) -> Self {
        self.arm_model = arm_model.into();
        self
    }

    /// Put an object on the table at `position`, given in the arm-base frame.
    pub fn with_object(mut self, name: impl Into<String>, position: Vec3) -> Self {
        self.world.place_object(name, position);
        self
    }

    /// Re-segment the table only on every `n`-th query.
    pub fn with_refresh_every(mut self, n: u32) -> Self {
        self.refresh_every = n;
        self
    }

    /// Consume the builder, returning a partially registered
    /// [`LocobotBuilder`] and a handle on the shared world.
    pub fn into_parts(self) -> (LocobotBuilder, SharedWorld) {
        let world: SharedWorld = Arc::new(Mutex::new(self.world));
        let builder = LocobotBuilder::default()
            .arm(SimArm::new(self.arm_model, Arc::clone(&world)))
            .gripper(SimGripper::new(Arc::clone(&world)))
            .camera(SimPanTilt::new(Arc::clone(&world)))
            .armtag(SimArmTag::new(Arc::clone(&world)))
            .pcl(SimPointCloud::new(Arc::clone(&world), self.refresh_every));
        (builder, world)
    }

    pub fn into_builder(self) -> LocobotBuilder {
        self.into_parts().0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
