//! Mirror of the runtime skeleton as scene nodes.
//!
//! A rebuild keys joints by [`NodeId`]: a node id present before and after
//! keeps its scene node (same [`NodeHandle`]), new ids get fresh nodes, and
//! nodes whose id disappeared are destroyed deepest first.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::runtime::ids::{JointType, NodeId};
use crate::runtime::pose::{JointTransform, Pose};
use crate::scene::{NodeHandle, SceneGraph};

/// One mirrored skeleton bone.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonJoint {
    pub name: String,
    /// Scene node of the joint. `None` when transforms are bypassed by a
    /// joint monitor, or when the runtime reported an invalid node id.
    pub node: Option<NodeHandle>,
    /// Index of the parent joint, `-1` for roots.
    pub parent_index: i32,
    pub node_id: NodeId,
}

impl SkeletonJoint {
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }
}

/// Summary of one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub created: usize,
    pub reused: usize,
    /// Node ids whose joints were destroyed, in destruction order.
    pub destroyed: Vec<NodeId>,
    /// Pose indices skipped because their node id was invalid.
    pub skipped: Vec<usize>,
    /// Pose indices whose parent index was out of range or self-referencing.
    /// These joints are treated as roots.
    pub invalid_parents: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct SkeletonMirror {
    joints: Vec<SkeletonJoint>,
    node_to_index: FxHashMap<NodeId, u32>,
    joint_type_to_node: FxHashMap<JointType, NodeId>,
    update_joint_indices: Vec<u32>,
}

impl SkeletonMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Rebuild
    // ========================================================================

    /// Rebuilds the joint array from `pose`.
    ///
    /// `name_of` resolves display names; empty names fall back to
    /// `joint{i}`. When `create_transforms` is false no scene nodes are
    /// created or reparented.
    pub fn rebuild(
        &mut self,
        pose: &Pose,
        name_of: impl Fn(NodeId) -> Option<String>,
        scene: &mut SceneGraph,
        base: NodeHandle,
        create_transforms: bool,
    ) -> RebuildReport {
        let joint_count = pose.joint_count();
        let mut report = RebuildReport::default();
        let mut new_joints = Vec::with_capacity(joint_count);
        let mut new_node_to_index =
            FxHashMap::with_capacity_and_hasher(joint_count, Default::default());

        for i in 0..joint_count {
            let node_id = pose.node_id(i);
            let name = name_of(node_id)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("joint{i}"));
            let mut parent_index = pose.parent_index(i);
            if parent_index >= 0
                && (parent_index as usize >= joint_count || parent_index as usize == i)
            {
                log::error!("Joint '{name}' has invalid parent index {parent_index}, treated as a root");
                report.invalid_parents.push(i);
                parent_index = -1;
            }

            if !node_id.is_valid() {
                log::error!("Invalid nodeId for {name}");
                report.skipped.push(i);
                new_joints.push(SkeletonJoint {
                    name,
                    node: None,
                    parent_index,
                    node_id,
                });
                continue;
            }

            new_node_to_index.insert(node_id, i as u32);

            if let Some(&prev) = self.node_to_index.get(&node_id) {
                let previous = &self.joints[prev as usize];
                debug_assert_eq!(previous.node_id, node_id);
                if let Some(node) = previous.node
                    && let Some(n) = scene.node_mut(node)
                {
                    n.name.clone_from(&name);
                }
                new_joints.push(SkeletonJoint {
                    name,
                    node: previous.node,
                    parent_index,
                    node_id,
                });
                report.reused += 1;
            } else {
                let node = create_transforms.then(|| scene.add_to_parent(name.clone(), base));
                new_joints.push(SkeletonJoint {
                    name,
                    node,
                    parent_index,
                    node_id,
                });
                report.created += 1;
            }
        }

        if create_transforms {
            Self::reparent_joints(&new_joints, scene, base, pose);
        }

        report.destroyed = self.destroy_removed_joints(&new_node_to_index, scene);

        self.joints = new_joints;
        self.node_to_index = new_node_to_index;
        self.joint_type_to_node.clear();
        self.update_joint_indices.clear();

        report
    }

    fn reparent_joints(joints: &[SkeletonJoint], scene: &mut SceneGraph, base: NodeHandle, pose: &Pose) {
        for (i, joint) in joints.iter().enumerate() {
            let Some(node) = joint.node else {
                continue;
            };
            let parent = if joint.parent_index < 0 {
                Some(base)
            } else {
                joints
                    .get(joint.parent_index as usize)
                    .and_then(|p| p.node)
            };
            match parent {
                Some(parent) => scene.attach(node, parent),
                None => log::warn!("Joint '{}' has no valid parent node", joint.name),
            }

            let local = initial_transform(joint, pose.local_transform(i));
            scene.set_local_transform(node, &local);
        }
    }

    /// Destroys joints whose node id is absent from `keep`, children first.
    fn destroy_removed_joints(
        &self,
        keep: &FxHashMap<NodeId, u32>,
        scene: &mut SceneGraph,
    ) -> Vec<NodeId> {
        let mut removed: Vec<(usize, &SkeletonJoint)> = self
            .node_to_index
            .iter()
            .filter(|(node_id, _)| !keep.contains_key(node_id))
            .map(|(_, &idx)| {
                let joint = &self.joints[idx as usize];
                (self.depth_of(idx as usize), joint)
            })
            .collect();

        removed.sort_by(|(da, a), (db, b)| {
            db.cmp(da)
                .then(b.parent_index.cmp(&a.parent_index))
                .then(a.node_id.cmp(&b.node_id))
        });

        removed
            .into_iter()
            .map(|(_, joint)| {
                if let Some(node) = joint.node {
                    debug_assert_eq!(
                        scene.node(node).map_or(0, crate::scene::Node::child_count),
                        0,
                        "joint '{}' destroyed with children",
                        joint.name
                    );
                    scene.destroy_node(node);
                }
                joint.node_id
            })
            .collect()
    }

    fn depth_of(&self, mut index: usize) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.joints.get(index).map(|j| j.parent_index)
            && parent >= 0
            && depth < self.joints.len()
        {
            depth += 1;
            index = parent as usize;
        }
        depth
    }

    // ========================================================================
    // Joint Types and Critical Joints
    // ========================================================================

    /// Fills the joint-type map from a batch query covering `types`.
    /// A length mismatch leaves the map empty.
    pub fn set_joint_type_nodes(&mut self, types: &[JointType], nodes: &[NodeId]) -> bool {
        self.joint_type_to_node.clear();
        if types.len() != nodes.len() {
            log::error!(
                "Joint type query returned {} nodes for {} types",
                nodes.len(),
                types.len()
            );
            return false;
        }
        self.joint_type_to_node
            .extend(types.iter().copied().zip(nodes.iter().copied()));
        true
    }

    /// Node for a joint type, [`NodeId::INVALID`] if the type is unmapped.
    #[must_use]
    pub fn node_for_type(&self, joint_type: JointType) -> NodeId {
        self.joint_type_to_node
            .get(&joint_type)
            .copied()
            .unwrap_or(NodeId::INVALID)
    }

    #[must_use]
    pub fn index_for_node(&self, node: NodeId) -> Option<u32> {
        self.node_to_index.get(&node).copied()
    }

    #[must_use]
    pub fn index_for_type(&self, joint_type: JointType) -> Option<u32> {
        let node = self.node_for_type(joint_type);
        if node.is_valid() { self.index_for_node(node) } else { None }
    }

    /// Scene node of the joint mapped to `joint_type`.
    #[must_use]
    pub fn transform_for_type(&self, joint_type: JointType) -> Option<NodeHandle> {
        let index = self.index_for_type(joint_type)?;
        self.joints.get(index as usize)?.node
    }

    /// Computes the sorted set of joint indices refreshed every frame: the
    /// given joint types plus every ancestor up to the root.
    pub fn compute_critical_joints(&mut self, joint_types: &[JointType]) -> &[u32] {
        let mut critical: FxHashSet<u32> = joint_types
            .iter()
            .filter_map(|&jt| self.index_for_type(jt))
            .collect();

        let parent_of = |index: i32| {
            self.joints
                .get(index as usize)
                .map_or(-1, |joint| joint.parent_index)
        };
        for index in critical.clone() {
            let mut parent = parent_of(index as i32);
            while parent >= 0
                && (parent as usize) < self.joints.len()
                && critical.insert(parent as u32)
            {
                parent = parent_of(parent);
            }
        }

        let mut indices: Vec<u32> = critical.into_iter().collect();
        indices.sort_unstable();
        self.update_joint_indices = indices;
        &self.update_joint_indices
    }

    pub fn clear_update_joints(&mut self) {
        self.update_joint_indices.clear();
    }

    #[must_use]
    pub fn update_joint_indices(&self) -> &[u32] {
        &self.update_joint_indices
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Writes the pose transform of joint `index` into its scene node.
    /// NaN transforms are skipped.
    pub fn apply_pose_at(&self, index: usize, pose: &Pose, scene: &mut SceneGraph) -> bool {
        let Some(joint) = self.joints.get(index) else {
            return false;
        };
        let Some(node) = joint.node else {
            return false;
        };
        let local = pose.local_transform(index);
        if local.is_nan() {
            return false;
        }
        scene.set_local_transform(node, &initial_transform(joint, local))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn joints(&self) -> &[SkeletonJoint] {
        &self.joints
    }

    #[must_use]
    pub fn joint(&self, index: usize) -> Option<&SkeletonJoint> {
        self.joints.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Destroys every joint node, children first, and clears all maps.
    pub fn destroy(&mut self, scene: &mut SceneGraph) {
        let removed = self.destroy_removed_joints(&FxHashMap::default(), scene);
        log::trace!("Destroyed {} skeleton joints", removed.len());
        self.joints.clear();
        self.node_to_index.clear();
        self.joint_type_to_node.clear();
        self.update_joint_indices.clear();
    }
}

/// Root joints carry a mirrored z scale; other joints are applied as is.
fn initial_transform(joint: &SkeletonJoint, local: JointTransform) -> JointTransform {
    if joint.is_root() {
        local.with_mirrored_z_scale()
    } else {
        local
    }
}
