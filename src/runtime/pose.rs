//! Snapshots returned by the runtime's pose and render-state queries.

use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::ids::{
    HierarchyVersion, NodeId, PrimitiveId, RenderInstanceId, RenderStateVersion,
};

/// Position / orientation / scale as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointTransform {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
}

impl JointTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn new(position: Vec3, orientation: Quat, scale: Vec3) -> Self {
        Self { position, orientation, scale }
    }

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::IDENTITY }
    }

    /// True if any component is NaN.
    #[inline]
    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.position.is_nan() || self.orientation.is_nan() || self.scale.is_nan()
    }

    /// Root joints carry a mirrored z axis relative to the host scene.
    #[inline]
    #[must_use]
    pub fn with_mirrored_z_scale(mut self) -> Self {
        self.scale.z = -self.scale.z;
        self
    }

    /// Converts between the runtime's and the host's handedness by
    /// reflecting across the z axis.
    #[inline]
    #[must_use]
    pub fn convert_space(self) -> Self {
        Self {
            position: Vec3::new(self.position.x, self.position.y, -self.position.z),
            orientation: Quat::from_xyzw(
                -self.orientation.x,
                -self.orientation.y,
                self.orientation.z,
                self.orientation.w,
            ),
            scale: self.scale,
        }
    }

    #[must_use]
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Skeleton pose of an entity.
///
/// `local_transforms`, `parents` and `node_ids` are parallel arrays of
/// length [`Pose::joint_count`]. A parent index of `-1` marks a root joint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pose {
    pub hierarchy_version: HierarchyVersion,
    pub local_transforms: Vec<JointTransform>,
    /// Object-space transforms, only produced when the entity requested them.
    pub object_transforms: Option<Vec<JointTransform>>,
    pub parents: Vec<i32>,
    pub node_ids: Vec<NodeId>,
}

impl Pose {
    #[inline]
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.node_ids.len()
    }

    #[inline]
    #[must_use]
    pub fn parent_index(&self, index: usize) -> i32 {
        self.parents.get(index).copied().unwrap_or(-1)
    }

    #[inline]
    #[must_use]
    pub fn node_id(&self, index: usize) -> NodeId {
        self.node_ids.get(index).copied().unwrap_or(NodeId::INVALID)
    }

    #[inline]
    #[must_use]
    pub fn local_transform(&self, index: usize) -> JointTransform {
        self.local_transforms.get(index).copied().unwrap_or_default()
    }
}

/// Mesh node lists and their version tokens.
///
/// `visible_mesh_nodes` is expected to be an ordered subsequence of
/// `all_mesh_nodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderState {
    pub primitive_count: u32,
    pub all_mesh_nodes: Vec<NodeId>,
    pub visible_mesh_nodes: Vec<NodeId>,
    pub all_nodes_version: RenderStateVersion,
    pub visible_nodes_version: RenderStateVersion,
}

/// Render state of one primitive instance, addressed by index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimitiveRenderState {
    pub mesh_node_id: NodeId,
    pub primitive_id: PrimitiveId,
    pub instance_id: RenderInstanceId,
    /// Index into the entity [`Pose`] for each primitive joint.
    pub joint_pose_indices: Vec<u32>,
    pub skinning_origin: JointTransform,
}
