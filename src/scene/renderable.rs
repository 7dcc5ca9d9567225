use crate::assets::{MaterialHandle, MeshHandle};
use crate::runtime::ids::{LodFlags, PrimitiveId, RenderInstanceId};
use crate::runtime::pose::JointTransform;
use crate::scene::NodeHandle;
use crate::sync::lod::LodCost;

/// Joint handles a skinned renderable is bound to, in primitive joint order.
///
/// Entries are `None` when the entity mirrors joints through a joint monitor
/// instead of scene nodes.
#[derive(Debug, Clone, Default)]
pub struct SkinBinding {
    pub joints: Vec<Option<NodeHandle>>,
}

/// Everything needed to place one primitive instance.
#[derive(Debug, Clone)]
pub struct RenderableDesc {
    pub name: String,
    pub primitive_id: PrimitiveId,
    pub instance_id: RenderInstanceId,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub lod_flags: LodFlags,
    pub cost: LodCost,
    pub morph_target_count: u32,
    pub skin: Option<SkinBinding>,
    /// Animation frames needed before the renderable's data is complete.
    pub required_animation_frames: u32,
}

/// Mesh + material instance attached to a scene node.
#[derive(Debug, Clone)]
pub struct Renderable {
    pub node: NodeHandle,
    pub primitive_id: PrimitiveId,
    pub instance_id: RenderInstanceId,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub lod_flags: LodFlags,
    pub cost: LodCost,
    pub skin: Option<SkinBinding>,
    pub morph_weights: Vec<f32>,
    pub skinning_origin: JointTransform,
    pub visible: bool,
    pub animation_enabled: bool,
    /// Value last broadcast by the render update, in `[0, 1]`.
    pub interpolation_value: f32,
    required_animation_frames: u32,
    animation_frames: u32,
}

impl Renderable {
    pub(crate) fn from_desc(node: NodeHandle, desc: RenderableDesc) -> Self {
        Self {
            node,
            primitive_id: desc.primitive_id,
            instance_id: desc.instance_id,
            mesh: desc.mesh,
            material: desc.material,
            lod_flags: desc.lod_flags,
            cost: desc.cost,
            skin: desc.skin,
            morph_weights: vec![0.0; desc.morph_target_count as usize],
            skinning_origin: JointTransform::IDENTITY,
            visible: false,
            animation_enabled: true,
            interpolation_value: 0.0,
            required_animation_frames: desc.required_animation_frames.max(1),
            animation_frames: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.skin.is_some()
    }

    #[inline]
    #[must_use]
    pub fn has_morph_targets(&self) -> bool {
        !self.morph_weights.is_empty()
    }

    /// Records that a new animation frame is being written.
    pub fn animation_frame_started(&mut self) {
        self.animation_frames = self.animation_frames.saturating_add(1);
    }

    /// True once enough frames were sampled to render without gaps.
    #[must_use]
    pub fn is_animation_data_complete(&self) -> bool {
        self.animation_frames >= self.required_animation_frames
    }

    #[must_use]
    pub fn animation_frames(&self) -> u32 {
        self.animation_frames
    }

    pub fn render_frame_update(&mut self, interpolation_value: f32) {
        self.interpolation_value = interpolation_value;
    }
}
