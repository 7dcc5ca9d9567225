//! Skeleton and Visibility Integration Tests
//!
//! Tests for:
//! - Skeleton rebuilds across several hierarchy versions: reuse, reparenting, removal order
//! - Root joint z mirroring as seen through world matrices
//! - Visibility walk: show/hide, missing nodes, out-of-order visible lists
//! - LOD cost accounting under random visibility sequences

use glam::Vec3;
use proptest::prelude::*;

use avatar_sync::assets::{MaterialHandle, MeshHandle};
use avatar_sync::runtime::ids::{
    HierarchyVersion, LOD_COUNT, LodFlags, NodeId, PrimitiveId, RenderInstanceId,
    RenderStateVersion,
};
use avatar_sync::runtime::pose::{JointTransform, Pose, RenderState};
use avatar_sync::scene::{NodeHandle, RenderableDesc, RenderableKey, SceneGraph};
use avatar_sync::sync::lod::LodCost;
use avatar_sync::sync::renderables::{PrimitiveRenderData, RenderableRegistry};
use avatar_sync::sync::skeleton::SkeletonMirror;

// ============================================================================
// Helpers
// ============================================================================

fn pose(version: u32, joints: &[(u32, i32, Vec3)]) -> Pose {
    Pose {
        hierarchy_version: HierarchyVersion(version),
        local_transforms: joints.iter().map(|j| JointTransform::from_position(j.2)).collect(),
        object_transforms: None,
        parents: joints.iter().map(|j| j.1).collect(),
        node_ids: joints.iter().map(|j| NodeId(j.0)).collect(),
    }
}

fn no_names(_: NodeId) -> Option<String> {
    None
}

fn joint_node(skeleton: &SkeletonMirror, node_id: u32) -> NodeHandle {
    let index = skeleton.index_for_node(NodeId(node_id)).unwrap() as usize;
    skeleton.joint(index).unwrap().node.unwrap()
}

fn render_state(all: &[u32], visible: &[u32], version: u32) -> RenderState {
    RenderState {
        primitive_count: all.len() as u32,
        all_mesh_nodes: all.iter().map(|n| NodeId(*n)).collect(),
        visible_mesh_nodes: visible.iter().map(|n| NodeId(*n)).collect(),
        all_nodes_version: RenderStateVersion(1),
        visible_nodes_version: RenderStateVersion(version),
    }
}

fn add_renderable(
    registry: &mut RenderableRegistry,
    scene: &mut SceneGraph,
    base: NodeHandle,
    mesh_node: u32,
    instance: u32,
    flags: LodFlags,
    cost: LodCost,
) -> RenderableKey {
    let primitive = PrimitiveId(u64::from(instance));
    let container = registry.lods_mut().container_for(primitive, flags, scene, base).unwrap();
    let key = scene.create_renderable(
        RenderableDesc {
            name: format!("prim{instance}"),
            primitive_id: primitive,
            instance_id: RenderInstanceId(instance),
            mesh: MeshHandle(u64::from(instance)),
            material: MaterialHandle(1),
            lod_flags: flags,
            cost,
            morph_target_count: 0,
            skin: None,
            required_animation_frames: 1,
        },
        container,
    );
    registry.insert(PrimitiveRenderData {
        mesh_node_id: NodeId(mesh_node),
        primitive_id: primitive,
        instance_id: RenderInstanceId(instance),
        renderable: key,
        lod_flags: flags,
        cost,
    });
    key
}

fn is_visible(scene: &SceneGraph, key: RenderableKey) -> bool {
    scene.renderable(key).unwrap().visible
}

// ============================================================================
// Skeleton Rebuilds
// ============================================================================

#[test]
fn rebuild_sequence_keeps_nodes_of_surviving_joints() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut skeleton = SkeletonMirror::new();

    let v1 = pose(
        1,
        &[(1, -1, Vec3::ZERO), (2, 0, Vec3::Y), (3, 1, Vec3::Y), (4, 0, Vec3::X)],
    );
    let report = skeleton.rebuild(&v1, no_names, &mut scene, base, true);
    assert_eq!(report.created, 4);
    let spine = joint_node(&skeleton, 2);
    let hand = joint_node(&skeleton, 4);

    // Joint 4 moves under joint 3, joint 5 is new.
    let v2 = pose(
        2,
        &[
            (1, -1, Vec3::ZERO),
            (2, 0, Vec3::Y),
            (3, 1, Vec3::Y),
            (4, 2, Vec3::X),
            (5, 3, Vec3::Z),
        ],
    );
    let report = skeleton.rebuild(&v2, no_names, &mut scene, base, true);
    assert_eq!(report.created, 1);
    assert_eq!(report.reused, 4);
    assert!(report.destroyed.is_empty());
    assert_eq!(joint_node(&skeleton, 2), spine);
    assert_eq!(joint_node(&skeleton, 4), hand);
    assert_eq!(scene.node(hand).unwrap().parent(), Some(joint_node(&skeleton, 3)));
    assert_eq!(scene.node(joint_node(&skeleton, 5)).unwrap().parent(), Some(hand));
    assert_eq!(scene.node_count(), 6);
}

#[test]
fn removed_chain_is_destroyed_deepest_first() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut skeleton = SkeletonMirror::new();

    let v1 = pose(
        1,
        &[(1, -1, Vec3::ZERO), (2, 0, Vec3::Y), (3, 1, Vec3::Y), (4, 2, Vec3::Y)],
    );
    skeleton.rebuild(&v1, no_names, &mut scene, base, true);

    let v2 = pose(2, &[(1, -1, Vec3::ZERO)]);
    let report = skeleton.rebuild(&v2, no_names, &mut scene, base, true);

    assert_eq!(report.destroyed, vec![NodeId(4), NodeId(3), NodeId(2)]);
    assert_eq!(skeleton.len(), 1);
    assert_eq!(scene.node_count(), 2);
    assert!(skeleton.index_for_node(NodeId(3)).is_none());
}

#[test]
fn reused_joint_takes_the_new_name() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut skeleton = SkeletonMirror::new();
    let v1 = pose(1, &[(1, -1, Vec3::ZERO)]);

    skeleton.rebuild(&v1, |_| Some("old".to_string()), &mut scene, base, true);
    let node = joint_node(&skeleton, 1);
    skeleton.rebuild(&v1, |_| Some("new".to_string()), &mut scene, base, true);

    assert_eq!(joint_node(&skeleton, 1), node);
    assert_eq!(skeleton.joint(0).unwrap().name, "new");
    assert_eq!(scene.node(node).unwrap().name, "new");
}

#[test]
fn root_mirror_flips_child_depth_in_world_space() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut skeleton = SkeletonMirror::new();
    let v1 = pose(1, &[(1, -1, Vec3::new(0.0, 1.0, 0.0)), (2, 0, Vec3::new(0.0, 0.0, 2.0))]);

    skeleton.rebuild(&v1, no_names, &mut scene, base, true);
    scene.update_world_matrices();

    let root = scene.world_position(joint_node(&skeleton, 1)).unwrap();
    let child = scene.world_position(joint_node(&skeleton, 2)).unwrap();
    assert!(root.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5));
    assert!(child.abs_diff_eq(Vec3::new(0.0, 1.0, -2.0), 1e-5));
}

#[test]
fn destroy_after_several_rebuilds_leaves_only_base() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut skeleton = SkeletonMirror::new();

    for version in 1..=3u32 {
        let joints: Vec<(u32, i32, Vec3)> = (0..version + 1)
            .map(|i| (10 * version + i, i as i32 - 1, Vec3::Y))
            .collect();
        skeleton.rebuild(&pose(version, &joints), no_names, &mut scene, base, true);
        assert_eq!(scene.node_count(), 1 + joints.len());
    }

    skeleton.destroy(&mut scene);
    assert!(skeleton.is_empty());
    assert_eq!(scene.node_count(), 1);
}

// ============================================================================
// Visibility
// ============================================================================

#[test]
fn visible_subset_shows_matching_renderables_only() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut registry = RenderableRegistry::new();
    let a = add_renderable(&mut registry, &mut scene, base, 1, 1, LodFlags::LOD_0, LodCost::new(10, 0, 5));
    let b = add_renderable(&mut registry, &mut scene, base, 2, 2, LodFlags::LOD_1, LodCost::new(20, 0, 7));
    let c = add_renderable(&mut registry, &mut scene, base, 3, 3, LodFlags::ALL, LodCost::new(1, 1, 1));

    let report = registry.update_visibility(&render_state(&[1, 2, 3], &[1, 3], 1), &mut scene);

    assert_eq!(report.shown, 2);
    assert_eq!(report.hidden, 0);
    assert!(report.missing.is_empty() && report.unmatched.is_empty());
    assert!(is_visible(&scene, a) && !is_visible(&scene, b) && is_visible(&scene, c));
    assert_eq!(registry.visible_nodes(), &[NodeId(1), NodeId(3)]);
    assert_eq!(registry.lods().visible_costs()[0], LodCost::new(11, 1, 6));
    assert_eq!(registry.lods().visible_costs()[1], LodCost::new(1, 1, 1));
    assert_eq!(registry.lods().highest_quality_index(), 0);
    assert_eq!(registry.lods().lowest_quality_index(), 0);

    let report = registry.update_visibility(&render_state(&[1, 2, 3], &[2], 2), &mut scene);
    assert_eq!(report.shown, 1);
    assert_eq!(report.hidden, 2);
    assert_eq!(registry.lods().visible_costs()[1], LodCost::new(20, 0, 7));
    assert!(registry.lods().visible_costs()[0].is_zero());
    assert_eq!(registry.lods().highest_quality_index(), 1);
}

#[test]
fn visible_node_without_renderables_is_reported_missing() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut registry = RenderableRegistry::new();
    let a = add_renderable(&mut registry, &mut scene, base, 1, 1, LodFlags::LOD_0, LodCost::new(1, 0, 1));

    let report = registry.update_visibility(&render_state(&[1, 9], &[1, 9], 1), &mut scene);

    assert_eq!(report.missing, vec![NodeId(9)]);
    assert!(report.unmatched.is_empty());
    assert!(is_visible(&scene, a));
    assert_eq!(registry.visible_nodes(), &[NodeId(1)]);
}

#[test]
fn out_of_order_visible_list_leaves_the_tail_hidden() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut registry = RenderableRegistry::new();
    let a = add_renderable(&mut registry, &mut scene, base, 1, 1, LodFlags::LOD_0, LodCost::new(1, 0, 1));
    let b = add_renderable(&mut registry, &mut scene, base, 2, 2, LodFlags::LOD_0, LodCost::new(1, 0, 1));
    let c = add_renderable(&mut registry, &mut scene, base, 3, 3, LodFlags::LOD_0, LodCost::new(1, 0, 1));

    let report = registry.update_visibility(&render_state(&[1, 2, 3], &[3, 1], 1), &mut scene);

    assert!(!is_visible(&scene, a));
    assert!(!is_visible(&scene, b));
    assert!(is_visible(&scene, c));
    assert_eq!(report.unmatched, vec![NodeId(1)]);
    assert_eq!(registry.visible_nodes(), &[NodeId(3)]);
}

#[test]
fn removing_a_visible_node_unbooks_its_cost() {
    let mut scene = SceneGraph::new();
    let base = scene.add_node("base");
    let mut registry = RenderableRegistry::new();
    add_renderable(&mut registry, &mut scene, base, 1, 1, LodFlags::LOD_2, LodCost::new(5, 5, 5));
    add_renderable(&mut registry, &mut scene, base, 1, 2, LodFlags::LOD_2, LodCost::new(1, 1, 1));
    add_renderable(&mut registry, &mut scene, base, 2, 3, LodFlags::LOD_3, LodCost::new(2, 2, 2));
    registry.update_visibility(&render_state(&[1, 2], &[1, 2], 1), &mut scene);
    assert_eq!(registry.lods().lowest_quality_index(), 3);

    let removed = registry.remove_stale_nodes(&[NodeId(2)], &mut scene);
    registry.lods_mut().refresh_range();

    assert_eq!(removed, vec![NodeId(1)]);
    assert_eq!(registry.renderable_count(), 1);
    assert!(registry.lods().visible_costs()[2].is_zero());
    assert_eq!(registry.lods().highest_quality_index(), 3);
    assert_eq!(registry.visible_nodes(), &[NodeId(2)]);
    assert!(registry.renderable_for_instance(RenderInstanceId(1)).is_none());
}

// ============================================================================
// LOD Cost Accounting
// ============================================================================

proptest! {
    #[test]
    fn visible_costs_track_visible_renderables(
        prims in prop::collection::vec((0usize..=LOD_COUNT, 0u32..1000, 0u32..1000, 0u32..1000), 1..8),
        masks in prop::collection::vec(any::<u8>(), 1..6),
    ) {
        let mut scene = SceneGraph::new();
        let base = scene.add_node("base");
        let mut registry = RenderableRegistry::new();

        let flags_of = |level: usize| {
            if level == LOD_COUNT { LodFlags::ALL } else { LodFlags::level(level) }
        };
        for (i, &(level, mesh, morph, tri)) in prims.iter().enumerate() {
            let id = i as u32 + 1;
            add_renderable(&mut registry, &mut scene, base, id, id, flags_of(level), LodCost::new(mesh, morph, tri));
        }
        let all: Vec<u32> = (1..=prims.len() as u32).collect();

        for (step, mask) in masks.iter().enumerate() {
            let visible: Vec<u32> = all.iter().copied().filter(|n| mask & (1 << (n - 1)) != 0).collect();
            let report = registry.update_visibility(&render_state(&all, &visible, step as u32 + 1), &mut scene);
            prop_assert!(report.missing.is_empty());
            prop_assert!(report.unmatched.is_empty());

            let mut levels = [LodCost::ZERO; LOD_COUNT];
            let mut shared = LodCost::ZERO;
            let mut highest = -1i32;
            let mut lowest = -1i32;
            for &n in &visible {
                let (level, mesh, morph, tri) = prims[n as usize - 1];
                let cost = LodCost::new(mesh, morph, tri);
                if level == LOD_COUNT {
                    shared += cost;
                } else {
                    levels[level] += cost;
                    let l = level as i32;
                    if highest == -1 || l < highest { highest = l; }
                    if l > lowest { lowest = l; }
                }
            }

            let costs = registry.lods().visible_costs();
            for level in 0..LOD_COUNT {
                prop_assert_eq!(costs[level], levels[level] + shared);
            }
            prop_assert_eq!(registry.lods().highest_quality_index(), highest);
            prop_assert_eq!(registry.lods().lowest_quality_index(), lowest);
            prop_assert_eq!(registry.lods().total_instance_count(), visible.len());
        }

        registry.destroy_all(&mut scene);
        prop_assert_eq!(registry.lods().container_count(), 0);
        prop_assert_eq!(registry.lods().total_instance_count(), 0);
        prop_assert_eq!(scene.renderable_count(), 0);
        prop_assert_eq!(scene.node_count(), 1);
    }
}
