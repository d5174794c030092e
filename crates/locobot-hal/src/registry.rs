//! [`Locobot`] – the bundle of capability drivers the control loop runs on.
//!
//! Construct one through [`LocobotBuilder`]: register a driver for every
//! slot, then call [`LocobotBuilder::build`].  A missing slot is reported as
//! a [`LocoError::Hardware`] naming the capability, so a half-wired robot
//! never reaches the control loop.

use locobot_types::LocoError;

use crate::arm::Arm;
use crate::armtag::ArmTag;
use crate::base::VelocityPublisher;
use crate::camera::PanTilt;
use crate::clock::Clock;
use crate::gripper::Gripper;
use crate::pointcloud::ClusterSource;

/// One driver per capability.
pub struct Locobot {
    pub arm: Box<dyn Arm>,
    pub gripper: Box<dyn Gripper>,
    pub camera: Box<dyn PanTilt>,
    pub armtag: Box<dyn ArmTag>,
    pub pcl: Box<dyn ClusterSource>,
    pub base: Box<dyn VelocityPublisher>,
    pub clock: Box<dyn Clock>,
}

impl Locobot {
    pub fn builder() -> LocobotBuilder {
        LocobotBuilder::default()
    }
}

impl std::fmt::Debug for Locobot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locobot")
            .field("arm", &self.arm.id())
            .field("gripper", &self.gripper.id())
            .field("camera", &self.camera.id())
            .field("base", &self.base.topic())
            .finish_non_exhaustive()
    }
}

/// Collects drivers for a [`Locobot`].  Registering a slot twice replaces
/// the earlier driver.
#[derive(Default)]
pub struct LocobotBuilder {
    arm: Option<Box<dyn Arm>>,
    gripper: Option<Box<dyn Gripper>>,
    camera: Option<Box<dyn PanTilt>>,
    armtag: Option<Box<dyn ArmTag>>,
    pcl: Option<Box<dyn ClusterSource>>,
    base: Option<Box<dyn VelocityPublisher>>,
    clock: Option<Box<dyn Clock>>,
}

impl LocobotBuilder {
    pub fn arm(mut self, arm: Box<dyn Arm>) -> Self {
        self.arm = Some(arm);
        self
    }

    pub fn gripper(mut self, gripper: Box<dyn Gripper>) -> Self {
        self.gripper = Some(gripper);
        self
    }

    pub fn camera(mut self, camera: Box<dyn PanTilt>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn armtag(mut self, armtag: Box<dyn ArmTag>) -> Self {
        self.armtag = Some(armtag);
        self
    }

    pub fn pcl(mut self, pcl: Box<dyn ClusterSource>) -> Self {
        self.pcl = Some(pcl);
        self
    }

    pub fn base(mut self, base: Box<dyn VelocityPublisher>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Consume the builder.
    ///
    /// # Errors
    ///
    /// Returns [`LocoError::Hardware`] for the first capability that has no
    /// registered driver.
    pub fn build(self) -> Result<Locobot, LocoError> {
        Ok(Locobot {
            arm: required(self.arm, "arm")?,
            gripper: required(self.gripper, "gripper")?,
            camera: required(self.camera, "camera")?,
            armtag: required(self.armtag, "armtag")?,
            pcl: required(self.pcl, "pcl")?,
            base: required(self.base, "base")?,
            clock: required(self.clock, "clock")?,
        })
    }
}

fn required<T>(slot: Option<T>, component: &str) -> Result<T, LocoError> {
    slot.ok_or_else(|| LocoError::Hardware {
        component: component.to_string(),
        details: format!("no '{component}' driver registered"),
    })
}
