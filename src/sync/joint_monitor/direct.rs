use glam::{Quat, Vec3};

use super::{JointData, JointMonitor, JointPose, MonitorCore, output_transform};
use crate::runtime::ids::JointType;
use crate::runtime::pose::JointTransform;
use crate::sync::animator::InterpolationValueProvider;

/// Output transform overwritten by every animation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformHolder {
    pub transform: JointTransform,
}

impl JointData for TransformHolder {
    fn create(_joint_type: JointType) -> Self {
        Self {
            transform: JointTransform::IDENTITY,
        }
    }

    fn add_animation_frame(&mut self, position: Vec3, orientation: Quat) {
        self.transform = output_transform(position, orientation);
    }

    fn position_and_orientation(&self) -> (Vec3, Quat) {
        (self.transform.position, self.transform.orientation)
    }
}

/// Monitor without smoothing: outputs follow the latest pose.
#[derive(Debug, Default)]
pub struct DirectJointMonitor {
    core: MonitorCore<TransformHolder>,
}

impl DirectJointMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl JointMonitor for DirectJointMonitor {
    fn on_joint_poses_updated(&mut self, poses: &[JointPose], is_loaded: &dyn Fn(JointType) -> bool) {
        self.core.on_joint_poses_updated(poses, is_loaded);
    }

    fn position_and_orientation(&self, joint_type: JointType) -> Option<(Vec3, Quat)> {
        self.core.get(joint_type).map(JointData::position_and_orientation)
    }

    fn joint_transform(&mut self, joint_type: JointType) -> Option<JointTransform> {
        self.core.get(joint_type).map(|j| j.transform)
    }

    fn update_joints(&mut self, _interpolation: &dyn InterpolationValueProvider) {}

    fn monitored_count(&self) -> usize {
        self.core.live_count()
    }

    fn dispose(&mut self) {
        self.core.clear();
    }
}
