//! Joint monitors.
//!
//! With GPU skinning the skeleton is not mirrored as scene nodes. Callers
//! that still need a few joints in object space (hands, head, culling
//! points) register joint types with the entity, which feeds their poses to
//! a monitor every animation frame.
//!
//! - [`DirectJointMonitor`]: writes each new pose straight to the output
//! - [`SmoothingJointMonitor`]: interpolates between the two latest poses
//! - [`BatchedJointMonitor`]: like smoothing, but output writes run as a
//!   parallel job joined before the next update

pub mod batched;
pub mod direct;
pub mod smoothing;

pub use batched::BatchedJointMonitor;
pub use direct::DirectJointMonitor;
pub use smoothing::SmoothingJointMonitor;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::runtime::ids::JointType;
use crate::runtime::pose::JointTransform;
use crate::sync::animator::InterpolationValueProvider;

/// Object-space pose of one monitored joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPose {
    pub joint_type: JointType,
    /// Index of the joint in the entity skeleton.
    pub joint_index: u32,
    pub position: Vec3,
    pub orientation: Quat,
}

impl JointPose {
    #[must_use]
    pub fn new(joint_type: JointType, joint_index: u32) -> Self {
        Self {
            joint_type,
            joint_index,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_transform(self, transform: &JointTransform) -> Self {
        Self {
            position: transform.position,
            orientation: transform.orientation,
            ..self
        }
    }
}

/// Per-entity consumer of monitored joint poses.
pub trait JointMonitor: Send {
    /// Receives the poses of every monitored, loaded joint. Joints that are
    /// tracked but absent from `poses` are dropped once `is_loaded` reports
    /// their type as gone.
    fn on_joint_poses_updated(&mut self, poses: &[JointPose], is_loaded: &dyn Fn(JointType) -> bool);

    /// Pose the monitor would currently output for `joint_type`.
    fn position_and_orientation(&self, joint_type: JointType) -> Option<(Vec3, Quat)>;

    /// Output transform of `joint_type`, relative to the entity base.
    fn joint_transform(&mut self, joint_type: JointType) -> Option<JointTransform>;

    /// Per-frame output update.
    fn update_joints(&mut self, interpolation: &dyn InterpolationValueProvider);

    /// Number of joints with live data.
    fn monitored_count(&self) -> usize;

    /// Releases all joint data. Outstanding work is completed first.
    fn dispose(&mut self);
}

/// Joint data a [`MonitorCore`] tracks per joint type.
pub trait JointData {
    fn create(joint_type: JointType) -> Self;

    fn add_animation_frame(&mut self, position: Vec3, orientation: Quat);

    fn position_and_orientation(&self) -> (Vec3, Quat);
}

/// Joint types whose data was created or disposed by one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorChanges {
    pub created: Vec<JointType>,
    pub disposed: Vec<JointType>,
}

impl MonitorChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.disposed.is_empty()
    }
}

/// Bookkeeping shared by all monitor flavours.
///
/// A joint type stays in `monitored` once seen. Its slot in `joints` is
/// `None` after the entity stopped providing it and is recreated when the
/// type comes back.
#[derive(Debug)]
pub struct MonitorCore<T> {
    monitored: Vec<JointType>,
    joints: FxHashMap<JointType, Option<T>>,
}

impl<T> Default for MonitorCore<T> {
    fn default() -> Self {
        Self {
            monitored: Vec::new(),
            joints: FxHashMap::default(),
        }
    }
}

impl<T: JointData> MonitorCore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_joint_poses_updated(
        &mut self,
        poses: &[JointPose],
        is_loaded: &dyn Fn(JointType) -> bool,
    ) -> MonitorChanges {
        let mut changes = MonitorChanges::default();

        for pose in poses {
            if !self.joints.contains_key(&pose.joint_type) {
                self.monitored.push(pose.joint_type);
            }
            let slot = self.joints.entry(pose.joint_type).or_insert(None);
            let data = slot.get_or_insert_with(|| {
                changes.created.push(pose.joint_type);
                T::create(pose.joint_type)
            });
            data.add_animation_frame(pose.position, pose.orientation);
        }

        if self.joints.len() != poses.len() {
            for &joint_type in &self.monitored {
                if is_loaded(joint_type) {
                    continue;
                }
                if let Some(slot) = self.joints.get_mut(&joint_type)
                    && slot.take().is_some()
                {
                    changes.disposed.push(joint_type);
                }
            }
        }

        if !changes.is_empty() {
            log::trace!(
                "Joint monitor created {} and disposed {} joints",
                changes.created.len(),
                changes.disposed.len()
            );
        }
        changes
    }

    #[must_use]
    pub fn get(&self, joint_type: JointType) -> Option<&T> {
        self.joints.get(&joint_type).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, joint_type: JointType) -> Option<&mut T> {
        self.joints.get_mut(&joint_type).and_then(Option::as_mut)
    }

    /// Live joints in first-monitored order.
    pub fn live_joints(&self) -> impl Iterator<Item = (JointType, &T)> + '_ {
        self.monitored
            .iter()
            .filter_map(|jt| self.get(*jt).map(|data| (*jt, data)))
    }

    pub fn live_joints_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.joints.values_mut().filter_map(Option::as_mut)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.joints.values().filter(|d| d.is_some()).count()
    }

    #[must_use]
    pub fn monitored_types(&self) -> &[JointType] {
        &self.monitored
    }

    pub fn clear(&mut self) {
        self.monitored.clear();
        self.joints.clear();
    }
}

#[inline]
pub(crate) fn output_transform(position: Vec3, orientation: Quat) -> JointTransform {
    JointTransform::new(position, orientation, Vec3::ONE)
}
