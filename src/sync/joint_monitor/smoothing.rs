use glam::{Quat, Vec3};

use super::{JointData, JointMonitor, JointPose, MonitorCore, output_transform};
use crate::runtime::ids::JointType;
use crate::runtime::pose::JointTransform;
use crate::sync::animator::InterpolationValueProvider;

/// Joint holding the two latest animation frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatingJoint {
    position0: Vec3,
    position1: Vec3,
    orientation0: Quat,
    orientation1: Quat,
    last_interpolation_value: f32,
    pub transform: JointTransform,
}

impl InterpolatingJoint {
    /// Pose at `t` between the earliest and latest frame.
    #[must_use]
    pub fn calculate_update(&self, t: f32) -> (Vec3, Quat) {
        (
            self.position0.lerp(self.position1, t),
            self.orientation0.slerp(self.orientation1, t),
        )
    }

    pub fn update_transform(&mut self, t: f32) {
        self.last_interpolation_value = t;
        let (position, orientation) = self.calculate_update(t);
        self.transform = output_transform(position, orientation);
    }

    /// Like [`Self::update_transform`], but leaves the output to the caller.
    pub(crate) fn advance(&mut self, t: f32) -> (Vec3, Quat) {
        self.last_interpolation_value = t;
        self.calculate_update(t)
    }
}

impl JointData for InterpolatingJoint {
    fn create(_joint_type: JointType) -> Self {
        Self {
            position0: Vec3::ZERO,
            position1: Vec3::ZERO,
            orientation0: Quat::IDENTITY,
            orientation1: Quat::IDENTITY,
            last_interpolation_value: 0.0,
            transform: JointTransform::IDENTITY,
        }
    }

    /// Shifts the latest frame to the earliest slot and stores the new one.
    fn add_animation_frame(&mut self, position: Vec3, orientation: Quat) {
        self.position0 = self.position1;
        self.orientation0 = self.orientation1;
        self.position1 = position;
        self.orientation1 = orientation;
    }

    fn position_and_orientation(&self) -> (Vec3, Quat) {
        self.calculate_update(self.last_interpolation_value)
    }
}

/// Monitor interpolating every joint with the entity's shared value.
#[derive(Debug, Default)]
pub struct SmoothingJointMonitor {
    core: MonitorCore<InterpolatingJoint>,
}

impl SmoothingJointMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JointMonitor for SmoothingJointMonitor {
    fn on_joint_poses_updated(&mut self, poses: &[JointPose], is_loaded: &dyn Fn(JointType) -> bool) {
        self.core.on_joint_poses_updated(poses, is_loaded);
    }

    fn position_and_orientation(&self, joint_type: JointType) -> Option<(Vec3, Quat)> {
        self.core.get(joint_type).map(JointData::position_and_orientation)
    }

    fn joint_transform(&mut self, joint_type: JointType) -> Option<JointTransform> {
        self.core.get(joint_type).map(|j| j.transform)
    }

    fn update_joints(&mut self, interpolation: &dyn InterpolationValueProvider) {
        let t = interpolation.render_interpolation_value();
        for joint in self.core.live_joints_mut() {
            joint.update_transform(t);
        }
    }

    fn monitored_count(&self) -> usize {
        self.core.live_count()
    }

    fn dispose(&mut self) {
        self.core.clear();
    }
}
