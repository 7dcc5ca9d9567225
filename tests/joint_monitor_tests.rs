//! Joint Monitor Integration Tests
//!
//! Tests for:
//! - Monitor selection from the settings
//! - Object-space joint output with GPU skinning (no joint nodes)
//! - NaN fallback to the base node
//! - Adding and removing monitored joints
//! - Joints dropped by a hierarchy rebuild
//! - Smoothing and batched monitors trailing the latest pose

use glam::{Quat, Vec3};

use avatar_sync::config::{JointMonitorKind, SyncSettings};
use avatar_sync::context::{AvatarContext, EntityKey};
use avatar_sync::runtime::ids::{HierarchyVersion, JointType, NodeId, RenderStateVersion};
use avatar_sync::runtime::memory::MemoryEntity;
use avatar_sync::runtime::pose::{JointTransform, Pose, RenderState};
use avatar_sync::runtime::{EntityAssetType, MemoryRuntime};
use avatar_sync::sync::entity::{AvatarEntity, FrameOutcome, LoadProgress};
use avatar_sync::sync::state::AvatarState;

const DT: f32 = 1.0 / 60.0;

// ============================================================================
// Helpers
// ============================================================================

fn settings(kind: JointMonitorKind) -> SyncSettings {
    SyncSettings {
        gpu_skinning: true,
        motion_smoothing: kind != JointMonitorKind::Direct,
        critical_joint_jobs: kind == JointMonitorKind::Batched,
        ..Default::default()
    }
}

fn pose(version: u32, joints: &[(u32, i32)], object: &[Vec3]) -> Pose {
    Pose {
        hierarchy_version: HierarchyVersion(version),
        local_transforms: vec![JointTransform::IDENTITY; joints.len()],
        object_transforms: Some(object.iter().map(|p| JointTransform::from_position(*p)).collect()),
        parents: joints.iter().map(|j| j.1).collect(),
        node_ids: joints.iter().map(|j| NodeId(j.0)).collect(),
    }
}

fn empty_render_state() -> RenderState {
    RenderState {
        primitive_count: 0,
        all_mesh_nodes: Vec::new(),
        visible_mesh_nodes: Vec::new(),
        all_nodes_version: RenderStateVersion(1),
        visible_nodes_version: RenderStateVersion(1),
    }
}

fn close(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, 1e-3)
}

struct Fixture {
    ctx: AvatarContext<MemoryRuntime>,
    entity: AvatarEntity,
}

impl Fixture {
    fn new(settings: SyncSettings) -> Self {
        let mut ctx = AvatarContext::new(MemoryRuntime::new(), settings);
        let mut entity = AvatarEntity::new(EntityKey::default(), "monitored");
        entity.create(&mut ctx).unwrap();
        Self { ctx, entity }
    }

    fn runtime(&mut self) -> &mut MemoryEntity {
        let id = self.entity.id();
        self.ctx.runtime.entity_mut(id).unwrap()
    }

    /// Hips, head and left wrist in a chain; the right wrist is not mapped.
    fn three_joint_avatar(&mut self, object: &[Vec3]) {
        let rt = self.runtime();
        rt.pose = Some(pose(1, &[(11, -1), (12, 0), (13, 1)], object));
        rt.render_state = Some(empty_render_state());
        rt.joint_types.insert(JointType::Hips, NodeId(11));
        rt.joint_types.insert(JointType::Head, NodeId(12));
        rt.joint_types.insert(JointType::LeftHandWrist, NodeId(13));
        rt.loaded_assets = vec![EntityAssetType::Other];
    }

    fn set_object_transforms(&mut self, object: &[Vec3]) {
        let pose = self.runtime().pose.as_mut().unwrap();
        pose.object_transforms = Some(object.iter().map(|p| JointTransform::from_position(*p)).collect());
    }

    fn tick(&mut self) -> (FrameOutcome, LoadProgress) {
        self.ctx.tick(DT);
        let outcome = self.entity.update(&mut self.ctx);
        let progress = self.entity.advance_loading(&mut self.ctx);
        for _ in self.ctx.load_queue.take_granted() {
            self.entity.start_granted_load();
        }
        (outcome, progress)
    }

    fn joint_position(&mut self, joint_type: JointType) -> Option<Vec3> {
        self.entity.monitored_joint_transform(joint_type).map(|t| t.position)
    }
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn monitor_follows_skinning_settings() {
    let f = Fixture::new(settings(JointMonitorKind::Direct));
    assert!(f.entity.has_joint_monitor());
    assert!(!f.entity.animator().is_motion_smoothing());
    assert_eq!(
        f.entity.monitored_joint_types(),
        &[
            JointType::Hips,
            JointType::Head,
            JointType::LeftHandWrist,
            JointType::RightHandWrist
        ]
    );

    let f = Fixture::new(settings(JointMonitorKind::Smoothing));
    assert!(f.entity.has_joint_monitor());
    assert!(f.entity.animator().is_motion_smoothing());

    let f = Fixture::new(SyncSettings {
        gpu_skinning: false,
        ..Default::default()
    });
    assert!(!f.entity.has_joint_monitor());
    assert!(f.entity.monitored_joint_types().is_empty());
}

// ============================================================================
// Direct Monitor
// ============================================================================

#[test]
fn gpu_skinned_load_creates_no_joint_nodes() {
    let mut f = Fixture::new(settings(JointMonitorKind::Direct));
    f.three_joint_avatar(&[Vec3::ZERO; 3]);

    assert_eq!(f.tick().1, LoadProgress::Finished);
    assert_eq!(f.entity.state(), AvatarState::UserAvatar);
    assert_eq!(f.entity.skeleton().len(), 3);
    assert!(f.entity.skeleton().joints().iter().all(|j| j.node.is_none()));
    assert!(f.entity.joint_node(JointType::Hips).is_none());
    assert_eq!(f.ctx.scene.node_count(), 1);
}

#[test]
fn direct_monitor_outputs_object_space_poses() {
    let mut f = Fixture::new(settings(JointMonitorKind::Direct));
    f.three_joint_avatar(&[Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 5.0, 1.0), Vec3::X]);
    f.tick();

    let poses: Vec<JointType> = f.entity.monitored_joint_poses().iter().map(|p| p.joint_type).collect();
    assert_eq!(poses, vec![JointType::Hips, JointType::Head, JointType::LeftHandWrist]);
    assert_eq!(f.entity.joint_monitor().unwrap().monitored_count(), 3);

    assert_eq!(f.joint_position(JointType::Hips), Some(Vec3::new(1.0, 2.0, -3.0)));
    assert_eq!(f.joint_position(JointType::Head), Some(Vec3::new(0.0, 5.0, -1.0)));
    assert_eq!(f.joint_position(JointType::RightHandWrist), None);

    f.set_object_transforms(&[Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO, Vec3::ZERO]);
    assert_eq!(f.tick().0, FrameOutcome::Synced);
    assert_eq!(f.joint_position(JointType::Hips), Some(Vec3::new(4.0, 0.0, 0.0)));

    let transform = f.entity.monitored_joint_transform(JointType::Hips).unwrap();
    assert_eq!(transform.scale, Vec3::ONE);
    assert_eq!(transform.orientation, Quat::IDENTITY);
}

#[test]
fn nan_object_transform_falls_back_to_base() {
    let mut f = Fixture::new(settings(JointMonitorKind::Direct));
    f.three_joint_avatar(&[Vec3::Y, Vec3::Y, Vec3::new(f32::NAN, 0.0, 0.0)]);
    f.tick();

    assert_eq!(f.joint_position(JointType::LeftHandWrist), Some(Vec3::ZERO));
    assert_eq!(f.joint_position(JointType::Hips), Some(Vec3::Y));
}

#[test]
fn added_joint_is_fed_from_the_next_frame() {
    let mut f = Fixture::new(settings(JointMonitorKind::Direct));
    f.three_joint_avatar(&[Vec3::X, Vec3::Y, Vec3::Z]);
    f.runtime().joint_types.insert(JointType::Chest, NodeId(12));
    f.tick();

    assert!(f.entity.add_monitored_joint(JointType::Chest));
    assert!(!f.entity.add_monitored_joint(JointType::Chest));
    assert!(f.entity.monitored_joint_poses().iter().any(|p| p.joint_type == JointType::Chest));
    assert_eq!(f.joint_position(JointType::Chest), None);

    f.tick();
    assert_eq!(f.joint_position(JointType::Chest), Some(Vec3::Y));
    assert_eq!(f.entity.joint_monitor().unwrap().monitored_count(), 4);

    assert!(f.entity.remove_monitored_joint(JointType::Chest));
    assert!(!f.entity.remove_monitored_joint(JointType::Chest));
    assert!(!f.entity.monitored_joint_types().contains(&JointType::Chest));
    assert!(f.entity.monitored_joint_poses().iter().all(|p| p.joint_type != JointType::Chest));
}

#[test]
fn monitored_joints_need_a_monitor() {
    let mut f = Fixture::new(SyncSettings {
        gpu_skinning: false,
        ..Default::default()
    });
    assert!(!f.entity.add_monitored_joint(JointType::Head));
    assert!(!f.entity.remove_monitored_joint(JointType::Head));
    assert_eq!(f.entity.monitored_joint_transform(JointType::Head), None);
}

#[test]
fn rebuild_drops_joints_the_skeleton_lost() {
    let mut f = Fixture::new(settings(JointMonitorKind::Direct));
    f.three_joint_avatar(&[Vec3::X, Vec3::Y, Vec3::Z]);
    f.tick();
    assert_eq!(f.entity.joint_monitor().unwrap().monitored_count(), 3);

    let rt = f.runtime();
    rt.pose = Some(pose(2, &[(11, -1), (13, 0)], &[Vec3::X, Vec3::Z]));
    rt.joint_types.remove(&JointType::Head);

    let (outcome, progress) = f.tick();
    assert_eq!(outcome, FrameOutcome::Frozen);
    assert_eq!(progress, LoadProgress::Finished);

    assert_eq!(f.entity.monitored_joint_poses().len(), 2);
    assert_eq!(f.entity.joint_monitor().unwrap().monitored_count(), 2);
    assert_eq!(f.joint_position(JointType::Head), None);
    assert_eq!(f.joint_position(JointType::LeftHandWrist), Some(Vec3::new(0.0, 0.0, -1.0)));
    assert_eq!(f.entity.monitored_joint_poses()[1].joint_index, 1);
}

// ============================================================================
// Smoothing Monitors
// ============================================================================

fn trailing_output(kind: JointMonitorKind) {
    let mut f = Fixture::new(settings(kind));
    f.three_joint_avatar(&[Vec3::X, Vec3::Y, Vec3::Z]);
    f.tick();
    assert_eq!(f.tick().0, FrameOutcome::Synced);

    f.set_object_transforms(&[Vec3::new(3.0, 0.0, 0.0), Vec3::Y, Vec3::Z]);
    assert_eq!(f.tick().0, FrameOutcome::Synced);

    // Two animation frames are buffered; output starts from the earlier one.
    let hips = f.joint_position(JointType::Hips).unwrap();
    assert!(close(hips, Vec3::X), "hips at {hips}");

    let (position, _) = f
        .entity
        .joint_monitor()
        .unwrap()
        .position_and_orientation(JointType::Hips)
        .unwrap();
    assert!(close(position, Vec3::X));

    f.set_object_transforms(&[Vec3::new(5.0, 0.0, 0.0), Vec3::Y, Vec3::Z]);
    f.tick();
    let hips = f.joint_position(JointType::Hips).unwrap();
    assert!(close(hips, Vec3::new(3.0, 0.0, 0.0)), "hips at {hips}");
}

#[test]
fn smoothing_monitor_trails_the_latest_pose() {
    trailing_output(JointMonitorKind::Smoothing);
}

#[test]
fn batched_monitor_matches_smoothing_output() {
    trailing_output(JointMonitorKind::Batched);
}

#[test]
fn teardown_disposes_the_monitor() {
    let mut f = Fixture::new(settings(JointMonitorKind::Batched));
    f.three_joint_avatar(&[Vec3::X, Vec3::Y, Vec3::Z]);
    f.tick();
    f.tick();

    f.entity.teardown(&mut f.ctx);
    assert!(!f.entity.has_joint_monitor());
    assert!(f.entity.monitored_joint_types().is_empty());
    assert_eq!(f.ctx.scene.node_count(), 0);
}
