//! The pick-and-place control loop.
//!
//! [`PickPlace::run`] calibrates once, then cycles through
//! perceive → filter → manipulate → locomote until the shutdown flag is
//! raised (or an optional iteration limit is reached).
//!
//! | Stage | Driver calls |
//! |---|---|
//! | Calibrate | camera pan/tilt, arm to tag pose, AR-tag estimate, arm to sleep |
//! | Perceive | cluster query, duplicate filter, arm to ready pose + gripper open |
//! | Manipulate | fixed seven-step pick sequence per cluster, arm to sleep |
//! | Locomote | one random drive command, then the loop period |
//!
//! The loop is single-threaded and blocking.  The shutdown flag is polled
//! between stages, between clusters, and inside every wait, which is sliced
//! into short pieces so an interrupt is noticed promptly.  An interrupt is
//! not an error: the run writes [`INTERRUPT_MESSAGE`] once and returns
//! normally.  Every driver failure propagates out of [`PickPlace::run`].

use std::f32::consts::PI;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use locobot_hal::{Clock, Locobot};
use locobot_perception::{ClusterHistory, DEFAULT_DEDUP_TOLERANCE, Transform3D};
use locobot_types::{Axis, Cluster, ClusterQuery, EePose, LocoError, Vec3};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, info_span, warn};

use crate::locomotion::Locomotion;

/// Printed exactly once when a run ends because of an interrupt.
pub const INTERRUPT_MESSAGE: &str = "Pick and Place interrupted!";

/// Frame cluster positions are requested in.
pub const ARM_BASE_FRAME: &str = "locobot/arm_base_link";

const CAMERA_PAN: f32 = 0.0;
const CAMERA_TILT: f32 = 0.75;
/// Height above a cluster used for approach and retreat.
const APPROACH_OFFSET: f32 = 0.05;
const GRASP_PITCH: f32 = 0.5;
/// Longest uninterrupted piece of any wait.
pub const SLEEP_SLICE: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────────────────
// Fixed poses
// ─────────────────────────────────────────────────────────────────────────────

/// Raised pose that shows the AR tag to the camera.
pub fn tag_pose() -> EePose {
    EePose::new().x(0.2).z(0.2).pitch(-PI / 8.0)
}

/// Pose taken before a batch of picks.
pub fn ready_pose() -> EePose {
    EePose::new().x(0.3).z(0.2).moving_time(1.5)
}

/// Drop-off pose over the virtual basket.
pub fn basket_pose() -> EePose {
    EePose::new().y(0.3).z(0.2)
}

/// Pose returned to after each drop.
pub fn staging_pose() -> EePose {
    EePose::new().x(0.3).z(0.2)
}

/// Approach/retreat pose above `position`.
pub fn above_pose(position: Vec3) -> EePose {
    grasp_pose(position).z(position.z + APPROACH_OFFSET)
}

/// Grasp pose at `position`.
pub fn grasp_pose(position: Vec3) -> EePose {
    EePose::new()
        .x(position.x)
        .y(position.y)
        .z(position.z)
        .pitch(GRASP_PITCH)
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration and state
// ─────────────────────────────────────────────────────────────────────────────

/// Loop tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct PickPlaceConfig {
    /// Frame cluster positions are expressed in.
    pub ref_frame: String,
    /// Absolute x tolerance for duplicate detection, in metres.
    pub dedup_tolerance: f32,
    /// Cap on remembered positions; `None` keeps every one.
    pub history_limit: Option<usize>,
    /// Wait after each calibration move.
    pub settle: Duration,
    /// Wait after each drive command.
    pub loop_period: Duration,
    /// Stop cleanly after this many iterations; `None` runs until
    /// interrupted.
    pub max_iterations: Option<u64>,
}

impl Default for PickPlaceConfig {
    fn default() -> Self {
        Self {
            ref_frame: ARM_BASE_FRAME.to_string(),
            dedup_tolerance: DEFAULT_DEDUP_TOLERANCE,
            history_limit: None,
            settle: Duration::from_millis(500),
            loop_period: Duration::from_secs(1),
            max_iterations: None,
        }
    }
}

impl PickPlaceConfig {
    /// Query issued on every perception step: sorted by y, descending.
    pub fn query(&self) -> ClusterQuery {
        ClusterQuery {
            ref_frame: self.ref_frame.clone(),
            sort_axis: Axis::Y,
            reverse: true,
        }
    }
}

/// State carried from one iteration to the next.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    /// Positions already acted on.
    pub history: ClusterHistory,
    /// Clusters that survived the last filter.
    pub clusters: Vec<Cluster>,
}

impl LoopState {
    pub fn new(history: ClusterHistory) -> Self {
        Self {
            history,
            clusters: Vec::new(),
        }
    }

    /// Remember the first cluster of the previous batch, if there was one.
    ///
    /// Only the first is recorded: it is the one a stale point cloud is
    /// most likely to report again.
    pub fn carry_over(&mut self) {
        if let Some(first) = self.clusters.first() {
            self.history.record(first.position);
        }
    }
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Fully completed iterations.
    pub iterations: u64,
    /// Completed pick sequences.
    pub picks: u64,
    /// Clusters rejected as duplicates.
    pub duplicates_skipped: u64,
    pub drive_commands: u64,
    pub interrupted: bool,
}

/// Whether the loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Interrupted,
}

fn interrupted(shutdown: &AtomicBool) -> bool {
    shutdown.load(Ordering::SeqCst)
}

/// Wait `duration` on `clock` in [`SLEEP_SLICE`] pieces, giving up as soon
/// as `shutdown` is raised.
pub fn sleep_sliced(clock: &mut dyn Clock, duration: Duration, shutdown: &AtomicBool) -> Flow {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if interrupted(shutdown) {
            return Flow::Interrupted;
        }
        let slice = remaining.min(SLEEP_SLICE);
        clock.sleep(slice);
        remaining -= slice;
    }
    if interrupted(shutdown) {
        Flow::Interrupted
    } else {
        Flow::Continue
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Control loop
// ─────────────────────────────────────────────────────────────────────────────

/// The pick-and-place behaviour, bound to one robot.
pub struct PickPlace<R: Rng = StdRng> {
    bot: Locobot,
    config: PickPlaceConfig,
    locomotion: Locomotion<R>,
    state: LoopState,
    summary: RunSummary,
    calibration: Option<Transform3D>,
}

impl<R: Rng> PickPlace<R> {
    pub fn new(bot: Locobot, config: PickPlaceConfig, locomotion: Locomotion<R>) -> Self {
        let history = ClusterHistory::new(config.dedup_tolerance).with_limit(config.history_limit);
        Self {
            bot,
            config,
            locomotion,
            state: LoopState::new(history),
            summary: RunSummary::default(),
            calibration: None,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Arm-base transform found during calibration.
    pub fn calibration(&self) -> Option<Transform3D> {
        self.calibration
    }

    /// Calibrate, then loop until interrupted or the iteration limit is hit.
    ///
    /// On interrupt, [`INTERRUPT_MESSAGE`] is written to `out` and the
    /// summary is returned with `interrupted` set.
    ///
    /// # Errors
    ///
    /// The first driver failure, or [`LocoError::Io`] if `out` cannot be
    /// written.
    pub fn run<W: Write>(&mut self, shutdown: &AtomicBool, out: &mut W) -> Result<RunSummary, LocoError> {
        let flow = match self.calibrate(shutdown)? {
            Flow::Continue => self.run_loop(shutdown)?,
            Flow::Interrupted => Flow::Interrupted,
        };

        if flow == Flow::Interrupted {
            self.summary.interrupted = true;
            writeln!(out, "{INTERRUPT_MESSAGE}").map_err(|e| LocoError::Io(e.to_string()))?;
        }
        info!(
            iterations = self.summary.iterations,
            picks = self.summary.picks,
            duplicates_skipped = self.summary.duplicates_skipped,
            drive_commands = self.summary.drive_commands,
            interrupted = self.summary.interrupted,
            "pick and place finished"
        );
        Ok(self.summary)
    }

    fn run_loop(&mut self, shutdown: &AtomicBool) -> Result<Flow, LocoError> {
        loop {
            if let Some(max) = self.config.max_iterations {
                if self.summary.iterations >= max {
                    info!(max, "iteration limit reached");
                    return Ok(Flow::Continue);
                }
            }
            if interrupted(shutdown) {
                return Ok(Flow::Interrupted);
            }

            let span = info_span!("iteration", n = self.summary.iterations + 1);
            let _enter = span.enter();
            if self.step(shutdown)? == Flow::Interrupted {
                return Ok(Flow::Interrupted);
            }
            self.summary.iterations += 1;
        }
    }

    /// Locate the arm base relative to the camera via the AR tag.
    pub fn calibrate(&mut self, shutdown: &AtomicBool) -> Result<Flow, LocoError> {
        info!("calibrating arm base against AR tag");
        self.bot.camera.pan_tilt_move(CAMERA_PAN, CAMERA_TILT)?;
        self.bot.arm.set_ee_pose_components(tag_pose())?;
        if self.pause(self.config.settle, shutdown) == Flow::Interrupted {
            return Ok(Flow::Interrupted);
        }

        let transform = self.bot.armtag.find_ref_to_arm_base_transform(true)?;
        info!(
            x = transform.translation.x,
            y = transform.translation.y,
            z = transform.translation.z,
            "arm base located"
        );
        self.calibration = Some(transform);

        self.bot.arm.go_to_sleep_pose()?;
        Ok(self.pause(self.config.settle, shutdown))
    }

    /// One perceive → manipulate → locomote cycle.
    pub fn step(&mut self, shutdown: &AtomicBool) -> Result<Flow, LocoError> {
        self.perceive()?;
        if interrupted(shutdown) {
            return Ok(Flow::Interrupted);
        }
        if self.manipulate(shutdown)? == Flow::Interrupted {
            return Ok(Flow::Interrupted);
        }
        if interrupted(shutdown) {
            return Ok(Flow::Interrupted);
        }
        self.locomote(shutdown)
    }

    /// Query and filter clusters; ready the arm if anything is left.
    ///
    /// Returns how many clusters survived the filter.  A query the service
    /// reports as unsuccessful counts as an empty result.
    pub fn perceive(&mut self) -> Result<usize, LocoError> {
        self.state.carry_over();

        let query = self.config.query();
        let clusters = match self.bot.pcl.get_cluster_positions(&query)? {
            Some(clusters) => clusters,
            None => {
                warn!(ref_frame = %query.ref_frame, "cluster query unsuccessful; treating as empty");
                Vec::new()
            }
        };

        let detected = clusters.len();
        let outcome = self.state.history.filter(clusters);
        self.summary.duplicates_skipped += outcome.dropped.len() as u64;
        info!(
            detected,
            kept = outcome.kept.len(),
            dropped = outcome.dropped.len(),
            history = self.state.history.len(),
            "clusters filtered"
        );
        self.state.clusters = outcome.kept;

        if !self.state.clusters.is_empty() {
            self.bot.arm.set_ee_pose_components(ready_pose())?;
            self.bot.gripper.open()?;
        }
        Ok(self.state.clusters.len())
    }

    /// Pick every filtered cluster into the basket, then put the arm to
    /// sleep.
    pub fn manipulate(&mut self, shutdown: &AtomicBool) -> Result<Flow, LocoError> {
        let clusters = self.state.clusters.clone();
        for cluster in &clusters {
            if interrupted(shutdown) {
                return Ok(Flow::Interrupted);
            }
            self.pick(cluster)?;
            self.summary.picks += 1;
        }
        self.bot.arm.go_to_sleep_pose()?;
        Ok(Flow::Continue)
    }

    fn pick(&mut self, cluster: &Cluster) -> Result<(), LocoError> {
        let above = above_pose(cluster.position);
        debug!(
            cluster = %cluster.name,
            x = cluster.position.x,
            y = cluster.position.y,
            z = cluster.position.z,
            "picking"
        );
        let arm = &mut self.bot.arm;
        let gripper = &mut self.bot.gripper;

        arm.set_ee_pose_components(above)?;
        arm.set_ee_pose_components(grasp_pose(cluster.position))?;
        gripper.close()?;
        arm.set_ee_pose_components(above)?;
        arm.set_ee_pose_components(basket_pose())?;
        gripper.open()?;
        arm.set_ee_pose_components(staging_pose())?;
        Ok(())
    }

    /// Publish one random drive command and wait out the loop period.
    pub fn locomote(&mut self, shutdown: &AtomicBool) -> Result<Flow, LocoError> {
        let cmd = self.locomotion.next_command();
        self.bot.base.publish(cmd)?;
        self.summary.drive_commands += 1;
        info!(
            topic = %self.bot.base.topic(),
            linear_x = cmd.linear_x(),
            angular_z = cmd.angular_z(),
            "drive command sent"
        );
        Ok(self.pause(self.config.loop_period, shutdown))
    }

    fn pause(&mut self, duration: Duration, shutdown: &AtomicBool) -> Flow {
        sleep_sliced(self.bot.clock.as_mut(), duration, shutdown)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
