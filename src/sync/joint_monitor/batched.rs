use glam::{Quat, Vec3};
use rayon::prelude::*;

use super::smoothing::InterpolatingJoint;
use super::{JointData, JointMonitor, JointPose, MonitorCore, output_transform};
use crate::runtime::ids::JointType;
use crate::runtime::pose::JointTransform;
use crate::sync::animator::InterpolationValueProvider;

/// Buffers owned by the transform job while it runs.
#[derive(Debug, Default)]
struct JobBuffers {
    /// Interpolated poses, parallel to `transforms`.
    poses: Vec<(Vec3, Quat)>,
    transforms: Vec<JointTransform>,
}

/// Smoothing monitor whose output writes run on the rayon pool.
///
/// Poses are interpolated on the calling thread into a buffer, then one job
/// per update copies them into the output transforms in parallel. The
/// buffers travel to the job and back over a channel; every access to them
/// first joins the outstanding job.
#[derive(Debug, Default)]
pub struct BatchedJointMonitor {
    core: MonitorCore<InterpolatingJoint>,
    job_joints: Vec<JointType>,
    buffers: JobBuffers,
    pending: Option<flume::Receiver<JobBuffers>>,
    joints_changed: bool,
}

impl BatchedJointMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the outstanding transform job (if any) is done.
    pub fn complete_job(&mut self) {
        let Some(rx) = self.pending.take() else {
            return;
        };
        match rx.recv() {
            Ok(buffers) => self.buffers = buffers,
            Err(_) => {
                log::error!("Joint transform job ended without returning its buffers");
                self.buffers = JobBuffers::default();
                self.joints_changed = true;
            }
        }
    }

    #[must_use]
    pub fn is_job_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn rebuild_buffers(&mut self) {
        let job_joints: Vec<JointType> = self.core.live_joints().map(|(jt, _)| jt).collect();
        let joint_count = job_joints.len();
        debug_assert_eq!(joint_count, self.core.live_count());

        self.complete_job();

        self.job_joints = job_joints;
        self.buffers = JobBuffers {
            poses: Vec::with_capacity(joint_count),
            transforms: vec![JointTransform::IDENTITY; joint_count],
        };
        self.joints_changed = false;
        log::trace!("Rebuilt joint job buffers for {joint_count} joints");
    }

    fn schedule_update_transforms_job(&mut self) {
        debug_assert!(self.pending.is_none());
        debug_assert_eq!(self.buffers.poses.len(), self.buffers.transforms.len());

        let mut buffers = std::mem::take(&mut self.buffers);
        let (tx, rx) = flume::bounded(1);
        rayon::spawn(move || {
            buffers
                .transforms
                .par_iter_mut()
                .zip(buffers.poses.par_iter())
                .for_each(|(transform, &(position, orientation))| {
                    *transform = output_transform(position, orientation);
                });
            // The receiver is gone only if the monitor was dropped.
            let _ = tx.send(buffers);
        });
        self.pending = Some(rx);
    }
}

impl JointMonitor for BatchedJointMonitor {
    fn on_joint_poses_updated(&mut self, poses: &[JointPose], is_loaded: &dyn Fn(JointType) -> bool) {
        let changes = self.core.on_joint_poses_updated(poses, is_loaded);
        self.joints_changed |= !changes.is_empty();
    }

    fn position_and_orientation(&self, joint_type: JointType) -> Option<(Vec3, Quat)> {
        self.core.get(joint_type).map(JointData::position_and_orientation)
    }

    fn joint_transform(&mut self, joint_type: JointType) -> Option<JointTransform> {
        self.complete_job();
        let index = self.job_joints.iter().position(|jt| *jt == joint_type)?;
        self.core.get(joint_type)?;
        self.buffers.transforms.get(index).copied()
    }

    fn update_joints(&mut self, interpolation: &dyn InterpolationValueProvider) {
        if self.joints_changed {
            self.rebuild_buffers();
        } else {
            self.complete_job();
        }

        // Nothing to schedule.
        if self.job_joints.is_empty() {
            return;
        }

        let t = interpolation.render_interpolation_value();
        self.buffers.poses.clear();
        for joint_type in &self.job_joints {
            let pose = self
                .core
                .get_mut(*joint_type)
                .map_or((Vec3::ZERO, Quat::IDENTITY), |joint| joint.advance(t));
            self.buffers.poses.push(pose);
        }

        self.schedule_update_transforms_job();
    }

    fn monitored_count(&self) -> usize {
        self.core.live_count()
    }

    fn dispose(&mut self) {
        self.complete_job();
        self.job_joints.clear();
        self.buffers = JobBuffers::default();
        self.joints_changed = false;
        self.core.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f32);

    impl InterpolationValueProvider for Fixed {
        fn render_interpolation_value(&self) -> f32 {
            self.0
        }
    }

    fn pose(joint_type: JointType, x: f32) -> JointPose {
        JointPose::new(joint_type, 0).with_transform(&JointTransform::from_position(Vec3::X * x))
    }

    #[test]
    fn job_output_is_visible_after_join() {
        let mut m = BatchedJointMonitor::new();
        m.on_joint_poses_updated(&[pose(JointType::Head, 0.0), pose(JointType::Neck, 0.0)], &|_| true);
        m.on_joint_poses_updated(&[pose(JointType::Head, 2.0), pose(JointType::Neck, 4.0)], &|_| true);

        m.update_joints(&Fixed(0.5));
        assert!(m.is_job_pending());

        let head = m.joint_transform(JointType::Head).unwrap();
        let neck = m.joint_transform(JointType::Neck).unwrap();
        assert!(!m.is_job_pending());
        assert!((head.position - Vec3::X).length() < 1e-5);
        assert!((neck.position - Vec3::X * 2.0).length() < 1e-5);
    }

    #[test]
    fn no_job_without_joints() {
        let mut m = BatchedJointMonitor::new();
        m.update_joints(&Fixed(1.0));
        assert!(!m.is_job_pending());
    }

    #[test]
    fn dropped_joint_rebuilds_buffers() {
        let mut m = BatchedJointMonitor::new();
        m.on_joint_poses_updated(&[pose(JointType::Head, 1.0), pose(JointType::Neck, 1.0)], &|_| true);
        m.update_joints(&Fixed(1.0));

        m.on_joint_poses_updated(&[pose(JointType::Head, 1.0)], &|jt| jt == JointType::Head);
        m.update_joints(&Fixed(1.0));
        assert_eq!(m.monitored_count(), 1);
        assert!(m.joint_transform(JointType::Neck).is_none());
        assert!(m.joint_transform(JointType::Head).is_some());

        m.dispose();
        assert_eq!(m.monitored_count(), 0);
    }
}
