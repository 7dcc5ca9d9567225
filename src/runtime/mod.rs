//! Contract with the external avatar runtime.
//!
//! The runtime owns pose solving, asset decoding and streaming. This crate
//! only consumes its snapshots through [`AvatarRuntime`]:
//!
//! - [`AvatarRuntime::query_pose`]: joints, parents, node ids, hierarchy version
//! - [`AvatarRuntime::query_render_state`]: mesh node lists and their versions
//! - [`AvatarRuntime::query_primitive_render_state`]: one primitive instance by index
//! - [`AvatarRuntime::query_joint_type_nodes`]: batch joint-type to node lookup
//!
//! Every query returns a [`Result`](crate::errors::Result) instead of
//! panicking; callers treat failures as "no data this tick".

pub mod ids;
pub mod memory;
pub mod pose;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use ids::{EntityFeatures, EntityId, JointType, LodFlags, NodeId, RenderInstanceId};
use pose::{Pose, PrimitiveRenderState, RenderState};

pub use memory::MemoryRuntime;

/// Parameters for creating a runtime entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCreateInfo {
    pub features: EntityFeatures,
    /// LOD levels the runtime should load for this entity.
    pub lod_filters: LodFlags,
}

impl Default for EntityCreateInfo {
    fn default() -> Self {
        Self {
            features: EntityFeatures::default(),
            lod_filters: LodFlags::ALL,
        }
    }
}

/// Health of a runtime entity, polled while a model is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Success,
    Pending,
    DataNotAvailable,
    InvalidData,
    Unknown,
}

impl RuntimeStatus {
    /// Statuses that mean the in-flight load can never complete.
    #[must_use]
    pub fn is_load_failure(self) -> bool {
        matches!(self, Self::DataNotAvailable | Self::InvalidData | Self::Unknown)
    }
}

/// Kind of asset the runtime reports as loaded on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityAssetType {
    /// The built-in default model.
    SystemDefaultModel,
    /// Controllers and other system assets; not tracked.
    SystemOther,
    /// A user supplied avatar.
    Other,
}

/// State of an asynchronous runtime load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadRequestState {
    Pending,
    Success,
    Failed,
    Cancelled,
}

/// Notification payload for a runtime load request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequestInfo {
    pub id: u32,
    pub entity: EntityId,
    pub state: LoadRequestState,
    pub failure: Option<String>,
}

/// Query surface of the avatar runtime.
pub trait AvatarRuntime {
    fn create_entity(&mut self, info: &EntityCreateInfo) -> Result<EntityId>;

    fn destroy_entity(&mut self, entity: EntityId) -> Result<()>;

    fn entity_status(&self, entity: EntityId) -> RuntimeStatus;

    fn query_pose(&self, entity: EntityId) -> Result<Pose>;

    /// Display name for a node, when the runtime has one.
    fn node_name(&self, entity: EntityId, node: NodeId) -> Option<String>;

    fn query_render_state(&self, entity: EntityId) -> Result<RenderState>;

    fn query_primitive_render_state(
        &self,
        entity: EntityId,
        index: u32,
    ) -> Result<PrimitiveRenderState>;

    /// Resolves each joint type to a node id; unmapped entries are
    /// [`NodeId::INVALID`]. The output is parallel to `types`.
    fn query_joint_type_nodes(&self, entity: EntityId, types: &[JointType]) -> Result<Vec<NodeId>>;

    fn loaded_asset_types(&self, entity: EntityId) -> Result<Vec<EntityAssetType>>;

    fn unload_default_model(&mut self, entity: EntityId) -> Result<()>;

    /// Writes the current morph target weights of a primitive instance.
    fn morph_target_weights(
        &self,
        entity: EntityId,
        instance: RenderInstanceId,
        weights: &mut [f32],
    ) -> Result<()>;
}
