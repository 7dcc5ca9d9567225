//! Primitive load gating and renderable construction.
//!
//! A load attempt walks every primitive index of a render-state snapshot.
//! Each index reports a [`SliceStep`]: `Continue` when its asset is ready
//! (or the renderable already exists), `Delay` when the asset is still
//! streaming in, `Cancel` when the attempt can never succeed. Renderables
//! are only built once every index reported `Continue`, so a mesh node never
//! shows a partial primitive set while its siblings are still loading.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::assets::{AssetStatus, PrimitiveCache};
use crate::errors::{Result, SyncError};
use crate::runtime::AvatarRuntime;
use crate::runtime::ids::{EntityId, PrimitiveId};
use crate::runtime::pose::{Pose, PrimitiveRenderState};
use crate::scene::{NodeHandle, RenderableDesc, SceneGraph, SkinBinding};
use crate::sync::renderables::{PrimitiveRenderData, RenderableRegistry};
use crate::sync::skeleton::SkeletonMirror;

/// Outcome of one time slice of loading work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStep {
    /// Done with this unit, move on.
    Continue,
    /// Not ready yet, retry on a later tick.
    Delay,
    /// Unrecoverable, abort the attempt.
    Cancel,
}

/// What a pass over the primitive indices found.
#[derive(Debug, Default)]
pub struct CheckPrimitivesResult {
    /// Primitives whose assets are still loading.
    pub new_primitive_ids: FxHashSet<PrimitiveId>,
    /// Ready primitive indices without a renderable, ascending.
    pub new_render_indices: BTreeSet<u32>,
    /// Error that cancelled the pass, if any.
    pub failure: Option<SyncError>,
}

impl CheckPrimitivesResult {
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        !self.new_primitive_ids.is_empty()
    }

    #[must_use]
    pub fn has_new_renderables(&self) -> bool {
        !self.new_render_indices.is_empty()
    }
}

/// Summary of [`LoadPipeline::build_new_renderables`].
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<PrimitiveRenderData>,
    /// Indices skipped for a per-primitive reason (joint mapping, LOD flags).
    pub skipped: Vec<u32>,
    /// First error that failed the whole batch.
    pub failure: Option<SyncError>,
}

impl BuildReport {
    /// True when no index failed the batch.
    #[must_use]
    pub fn built_all(&self) -> bool {
        self.failure.is_none()
    }
}

/// Scene-side targets a build writes into.
pub struct BuildTargets<'a> {
    pub registry: &'a mut RenderableRegistry,
    pub skeleton: &'a SkeletonMirror,
    pub scene: &'a mut SceneGraph,
    /// Entity base node; LOD containers hang below it.
    pub base: NodeHandle,
    /// Frames a renderable must sample before its animation data is complete.
    pub required_animation_frames: u32,
}

/// Borrowed view of what a load attempt reads from.
pub struct LoadPipeline<'a, R: AvatarRuntime + ?Sized> {
    pub runtime: &'a R,
    pub entity: EntityId,
    pub assets: &'a PrimitiveCache,
}

impl<'a, R: AvatarRuntime + ?Sized> LoadPipeline<'a, R> {
    pub fn new(runtime: &'a R, entity: EntityId, assets: &'a PrimitiveCache) -> Self {
        Self { runtime, entity, assets }
    }

    // ========================================================================
    // Gating
    // ========================================================================

    /// Classifies primitive `index` and records it in `result`.
    pub fn wait_for_load(&self, registry: &RenderableRegistry, result: &mut CheckPrimitivesResult, index: u32) -> SliceStep {
        let prim_state = match self.runtime.query_primitive_render_state(self.entity, index) {
            Ok(state) => state,
            Err(e) => {
                log::error!("Failed to query primitive render state {index}: {e}");
                result.failure = Some(e);
                return SliceStep::Cancel;
            }
        };

        if registry.has_primitive(prim_state.mesh_node_id, prim_state.primitive_id) {
            return SliceStep::Continue;
        }

        let primitive_id = prim_state.primitive_id;
        match self.assets.status(primitive_id) {
            None => {
                log::error!("Unable to find primitive asset {primitive_id}");
                result.failure = Some(SyncError::AssetMissing(primitive_id));
                SliceStep::Cancel
            }
            Some(AssetStatus::Cancelled) => {
                log::error!("Primitive asset {primitive_id} load was cancelled");
                result.failure = Some(SyncError::AssetCancelled(primitive_id));
                SliceStep::Cancel
            }
            Some(AssetStatus::Loading) => {
                result.new_primitive_ids.insert(primitive_id);
                SliceStep::Delay
            }
            Some(AssetStatus::Loaded) => {
                result.new_render_indices.insert(index);
                SliceStep::Continue
            }
        }
    }

    /// Visits every primitive index, recording all loading assets and all
    /// ready indices. Used by the synchronous per-frame path.
    pub fn check_for_new_renderables(&self, registry: &RenderableRegistry, primitive_count: u32) -> CheckPrimitivesResult {
        let mut result = CheckPrimitivesResult::default();
        for index in 0..primitive_count {
            self.wait_for_load(registry, &mut result, index);
        }
        result
    }

    /// Visits primitive indices until the first one that is not ready.
    pub fn check_primitives_loaded(&self, registry: &RenderableRegistry) -> (SliceStep, CheckPrimitivesResult) {
        let mut result = CheckPrimitivesResult::default();
        let render_state = match self.runtime.query_render_state(self.entity) {
            Ok(state) => state,
            Err(e) => {
                log::error!("Unable to query entity render state: {e}");
                result.failure = Some(e);
                return (SliceStep::Cancel, result);
            }
        };

        for index in 0..render_state.primitive_count {
            let step = self.wait_for_load(registry, &mut result, index);
            if step != SliceStep::Continue {
                return (step, result);
            }
        }
        (SliceStep::Continue, result)
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Builds a renderable for every index in `indices` and binds it in the
    /// registry.
    ///
    /// Joint mapping failures and multi-LOD primitives skip only their own
    /// index. Query and asset failures fail the batch, but indices built
    /// before the failure stay bound.
    pub fn build_new_renderables(&self, indices: &BTreeSet<u32>, targets: &mut BuildTargets<'_>) -> BuildReport {
        let mut report = BuildReport::default();
        if indices.is_empty() {
            return report;
        }

        let pose = match self.runtime.query_pose(self.entity) {
            Ok(pose) => pose,
            Err(e) => {
                log::error!("Failed to query entity pose for building primitives: {e}");
                report.failure = Some(e);
                return report;
            }
        };

        for &index in indices {
            match self.build_primitive_renderable(index, &pose, targets) {
                Ok(Some(data)) => {
                    targets.registry.insert(data);
                    report.built.push(data);
                }
                Ok(None) => report.skipped.push(index),
                Err(e) => {
                    log::error!("Failed to build primitive renderable {index}: {e}");
                    if report.failure.is_none() {
                        report.failure = Some(e);
                    }
                }
            }
        }

        log::debug!(
            "Built {} renderables for entity {} ({} skipped)",
            report.built.len(),
            self.entity,
            report.skipped.len()
        );
        report
    }

    /// Builds the renderable for primitive `index`.
    ///
    /// `Ok(None)` means the primitive was skipped and nothing was created.
    pub fn build_primitive_renderable(
        &self,
        index: u32,
        pose: &Pose,
        targets: &mut BuildTargets<'_>,
    ) -> Result<Option<PrimitiveRenderData>> {
        let prim_state = self.runtime.query_primitive_render_state(self.entity, index)?;
        let primitive_id = prim_state.primitive_id;

        if !prim_state.mesh_node_id.is_valid() {
            return Err(SyncError::InvalidMeshNode(primitive_id));
        }

        let Some((asset, status)) = self.assets.resolve(primitive_id) else {
            return Err(SyncError::AssetMissing(primitive_id));
        };
        match status {
            AssetStatus::Loaded => {}
            AssetStatus::Cancelled => return Err(SyncError::AssetCancelled(primitive_id)),
            AssetStatus::Loading => {
                log::warn!("Primitive asset {primitive_id} is still loading, skipping build");
                return Ok(None);
            }
        }

        let skin = if asset.has_joints() {
            match self.map_joints(&prim_state, pose, targets.skeleton) {
                Ok(skin) => Some(skin),
                Err(e) => {
                    log::error!("Could not map primitive {index} to the entity pose: {e}");
                    return Ok(None);
                }
            }
        } else {
            None
        };

        let container = match targets
            .registry
            .lods_mut()
            .container_for(primitive_id, asset.lod_flags, targets.scene, targets.base)
        {
            Ok(container) => container,
            Err(e) => {
                log::error!("{e}");
                return Ok(None);
            }
        };

        let desc = RenderableDesc {
            name: asset.name.clone(),
            primitive_id,
            instance_id: prim_state.instance_id,
            mesh: asset.mesh,
            material: asset.material,
            lod_flags: asset.lod_flags,
            cost: asset.cost,
            morph_target_count: asset.morph_target_count,
            skin,
            required_animation_frames: targets.required_animation_frames,
        };
        let is_skinned = desc.skin.is_some();
        let key = targets.scene.create_renderable(desc, container);

        let origin = prim_state.skinning_origin.with_mirrored_z_scale().convert_space();
        if let Some(renderable) = targets.scene.renderable_mut(key) {
            renderable.skinning_origin = origin;
            if !is_skinned {
                let node = renderable.node;
                targets.scene.set_local_transform(node, &origin);
            }
        }

        Ok(Some(PrimitiveRenderData {
            mesh_node_id: prim_state.mesh_node_id,
            primitive_id,
            instance_id: prim_state.instance_id,
            renderable: key,
            lod_flags: asset.lod_flags,
            cost: asset.cost,
        }))
    }

    /// Maps each primitive joint to the entity skeleton through its node id.
    fn map_joints(&self, prim_state: &PrimitiveRenderState, pose: &Pose, skeleton: &SkeletonMirror) -> Result<SkinBinding> {
        let mut joints = Vec::with_capacity(prim_state.joint_pose_indices.len());
        for (joint, &pose_index) in prim_state.joint_pose_indices.iter().enumerate() {
            let node = pose.node_id(pose_index as usize);
            let Some(entity_index) = skeleton.index_for_node(node) else {
                if let Some(name) = self.runtime.node_name(self.entity, node) {
                    log::debug!("Unmapped joint {joint} is named {name}");
                }
                return Err(SyncError::JointMappingFailed {
                    primitive: prim_state.primitive_id,
                    joint,
                    node,
                });
            };
            joints.push(skeleton.joint(entity_index as usize).and_then(|j| j.node));
        }
        Ok(SkinBinding { joints })
    }
}

// ============================================================================
// Load task
// ============================================================================

/// What a queued load attempt has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// The hierarchy changed: rebuild the skeleton, then the primitives.
    SkeletonAndPrimitives,
    /// Only new primitives need building.
    Primitives,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    BuildSkeleton,
    BuildPrimitives,
    Finalize,
}

/// Resumable state of one running load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTask {
    pub kind: LoadKind,
    pub phase: LoadPhase,
    /// Ticks this task has been stepped.
    pub steps: u32,
}

impl LoadTask {
    #[must_use]
    pub fn new(kind: LoadKind) -> Self {
        let phase = match kind {
            LoadKind::SkeletonAndPrimitives => LoadPhase::BuildSkeleton,
            LoadKind::Primitives => LoadPhase::BuildPrimitives,
        };
        Self { kind, phase, steps: 0 }
    }
}
