use serde::{Deserialize, Serialize};

use crate::runtime::ids::{LodFlags, PrimitiveId};
use crate::sync::lod::LodCost;

/// Opaque handle to a GPU mesh owned by the host renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub u64);

/// Opaque handle to a material owned by the host renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialHandle(pub u64);

/// Load status of a cached primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    Loading,
    Loaded,
    Cancelled,
}

/// Decoded render primitive, shared by every entity that places it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimitiveAsset {
    pub id: PrimitiveId,
    pub name: String,
    /// Number of joints the primitive is skinned to. Zero for rigid meshes.
    pub joint_count: u32,
    pub morph_target_count: u32,
    pub lod_flags: LodFlags,
    pub cost: LodCost,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
}

impl PrimitiveAsset {
    #[must_use]
    pub fn new(id: PrimitiveId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            joint_count: 0,
            morph_target_count: 0,
            lod_flags: LodFlags::ALL,
            cost: LodCost::default(),
            mesh: MeshHandle::default(),
            material: MaterialHandle::default(),
        }
    }

    #[must_use]
    pub fn with_joints(mut self, joint_count: u32) -> Self {
        self.joint_count = joint_count;
        self
    }

    #[must_use]
    pub fn with_morph_targets(mut self, count: u32) -> Self {
        self.morph_target_count = count;
        self
    }

    #[must_use]
    pub fn with_lod(mut self, flags: LodFlags) -> Self {
        self.lod_flags = flags;
        self
    }

    #[must_use]
    pub fn with_cost(mut self, cost: LodCost) -> Self {
        self.cost = cost;
        self
    }

    #[inline]
    #[must_use]
    pub fn has_joints(&self) -> bool {
        self.joint_count > 0
    }
}
