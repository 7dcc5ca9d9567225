//! In-process runtime whose state is pushed by the caller.
//!
//! `MemoryRuntime` answers every query from plain data the host writes into
//! it. It is used for headless replay of recorded sessions and by the tests.
//! A query whose snapshot is `None` fails, which is how callers simulate a
//! runtime that has no data yet.

use rustc_hash::FxHashMap;

use super::ids::{EntityId, JointType, NodeId, RenderInstanceId};
use super::pose::{Pose, PrimitiveRenderState, RenderState};
use super::{AvatarRuntime, EntityAssetType, EntityCreateInfo, RuntimeStatus};
use crate::errors::{Result, SyncError};

/// Data held for one entity.
#[derive(Debug, Clone)]
pub struct MemoryEntity {
    pub info: EntityCreateInfo,
    pub status: RuntimeStatus,
    pub pose: Option<Pose>,
    pub render_state: Option<RenderState>,
    pub primitives: Vec<PrimitiveRenderState>,
    pub node_names: FxHashMap<NodeId, String>,
    pub joint_types: FxHashMap<JointType, NodeId>,
    pub loaded_assets: Vec<EntityAssetType>,
    pub morph_weights: FxHashMap<RenderInstanceId, Vec<f32>>,
    pub default_model_unloads: u32,
}

impl MemoryEntity {
    fn new(info: EntityCreateInfo) -> Self {
        Self {
            info,
            status: RuntimeStatus::Success,
            pose: None,
            render_state: None,
            primitives: Vec::new(),
            node_names: FxHashMap::default(),
            joint_types: FxHashMap::default(),
            loaded_assets: Vec::new(),
            morph_weights: FxHashMap::default(),
            default_model_unloads: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRuntime {
    entities: FxHashMap<EntityId, MemoryEntity>,
    next_id: u32,
    destroyed: Vec<EntityId>,
}

impl MemoryRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&MemoryEntity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut MemoryEntity> {
        self.entities.get_mut(&id)
    }

    /// Entities destroyed so far, in destruction order.
    #[must_use]
    pub fn destroyed(&self) -> &[EntityId] {
        &self.destroyed
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entities.len()
    }

    fn get(&self, id: EntityId, query: &'static str) -> Result<&MemoryEntity> {
        self.entities
            .get(&id)
            .ok_or(SyncError::QueryFailed { query, entity: id })
    }
}

impl AvatarRuntime for MemoryRuntime {
    fn create_entity(&mut self, info: &EntityCreateInfo) -> Result<EntityId> {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(id, MemoryEntity::new(info.clone()));
        Ok(id)
    }

    fn destroy_entity(&mut self, entity: EntityId) -> Result<()> {
        if self.entities.remove(&entity).is_none() {
            return Err(SyncError::RuntimeCall {
                call: "destroy_entity",
                reason: format!("unknown entity {entity}"),
            });
        }
        self.destroyed.push(entity);
        Ok(())
    }

    fn entity_status(&self, entity: EntityId) -> RuntimeStatus {
        self.entities
            .get(&entity)
            .map_or(RuntimeStatus::Unknown, |e| e.status)
    }

    fn query_pose(&self, entity: EntityId) -> Result<Pose> {
        self.get(entity, "pose")?
            .pose
            .clone()
            .ok_or(SyncError::QueryFailed { query: "pose", entity })
    }

    fn node_name(&self, entity: EntityId, node: NodeId) -> Option<String> {
        self.entities.get(&entity)?.node_names.get(&node).cloned()
    }

    fn query_render_state(&self, entity: EntityId) -> Result<RenderState> {
        self.get(entity, "render_state")?
            .render_state
            .clone()
            .ok_or(SyncError::QueryFailed { query: "render_state", entity })
    }

    fn query_primitive_render_state(
        &self,
        entity: EntityId,
        index: u32,
    ) -> Result<PrimitiveRenderState> {
        self.get(entity, "primitive_render_state")?
            .primitives
            .get(index as usize)
            .cloned()
            .ok_or(SyncError::QueryFailed { query: "primitive_render_state", entity })
    }

    fn query_joint_type_nodes(&self, entity: EntityId, types: &[JointType]) -> Result<Vec<NodeId>> {
        let data = self.get(entity, "joint_type_nodes")?;
        Ok(types
            .iter()
            .map(|jt| data.joint_types.get(jt).copied().unwrap_or(NodeId::INVALID))
            .collect())
    }

    fn loaded_asset_types(&self, entity: EntityId) -> Result<Vec<EntityAssetType>> {
        Ok(self.get(entity, "loaded_asset_types")?.loaded_assets.clone())
    }

    fn unload_default_model(&mut self, entity: EntityId) -> Result<()> {
        let data = self
            .entities
            .get_mut(&entity)
            .ok_or(SyncError::QueryFailed { query: "unload_default_model", entity })?;
        data.loaded_assets
            .retain(|t| *t != EntityAssetType::SystemDefaultModel);
        data.default_model_unloads += 1;
        Ok(())
    }

    fn morph_target_weights(
        &self,
        entity: EntityId,
        instance: RenderInstanceId,
        weights: &mut [f32],
    ) -> Result<()> {
        let data = self.get(entity, "morph_target_weights")?;
        let source = data
            .morph_weights
            .get(&instance)
            .ok_or(SyncError::QueryFailed { query: "morph_target_weights", entity })?;
        let n = source.len().min(weights.len());
        weights[..n].copy_from_slice(&source[..n]);
        Ok(())
    }
}
