//! The avatar entity aggregate.
//!
//! An [`AvatarEntity`] owns the mirrored state of one runtime entity and is
//! composed from the sync building blocks:
//!
//! - [`SkeletonMirror`]: joints as scene nodes
//! - [`RenderableRegistry`]: mesh node bindings, visibility, LOD cost
//! - [`EntityAnimator`]: animation time and interpolation value
//! - [`JointMonitor`]: optional output of a few joints without scene nodes
//! - [`VersionedStateCache`]: what the mirror was built against
//!
//! All methods take the shared [`AvatarContext`] explicitly. The per-frame
//! sync loop lives in `update`, resumable load work in `loading`, joint
//! monitoring and animation sampling in `monitoring`.

mod loading;
mod monitoring;
mod update;

pub use loading::LoadProgress;
pub use update::FrameOutcome;

use crate::config::JointMonitorKind;
use crate::context::{AvatarContext, EntityKey};
use crate::errors::{Result, SyncError};
use crate::runtime::ids::{EntityFeatures, EntityId, JointType, LOD_COUNT};
use crate::runtime::pose::JointTransform;
use crate::runtime::{AvatarRuntime, LoadRequestInfo, LoadRequestState};
use crate::scene::NodeHandle;
use crate::sync::animator::EntityAnimator;
use crate::sync::events::EntityEvent;
use crate::sync::joint_monitor::{
    BatchedJointMonitor, DirectJointMonitor, JointMonitor, JointPose, SmoothingJointMonitor,
};
use crate::sync::loader::{LoadKind, LoadTask};
use crate::sync::lod::LodCost;
use crate::sync::renderables::RenderableRegistry;
use crate::sync::skeleton::SkeletonMirror;
use crate::sync::state::{AvatarState, LoadingState};
use crate::sync::versions::VersionedStateCache;

/// One mirrored avatar.
pub struct AvatarEntity {
    key: EntityKey,
    id: EntityId,
    name: String,
    /// Root of everything this entity puts in the scene.
    base: Option<NodeHandle>,
    features: EntityFeatures,
    active: bool,

    state: AvatarState,
    load_state: LoadingState,
    last_announced_load_state: LoadingState,
    versions: VersionedStateCache,

    skeleton: SkeletonMirror,
    renderables: RenderableRegistry,
    animator: EntityAnimator,
    joint_monitor: Option<Box<dyn JointMonitor>>,

    /// Joint types fed to the joint monitor, in insertion order.
    monitored_joint_types: Vec<JointType>,
    /// Poses of the monitored types that are loaded in the skeleton.
    monitored_joint_poses: Vec<JointPose>,
    /// Types refreshed every frame without a monitor; also the initial
    /// monitored set.
    critical_joint_types: Vec<JointType>,
    transform_skinning: bool,
    fast_load: bool,

    is_applying_models: bool,
    load: Option<LoadTask>,
    /// Load waiting for a slot in the context's load queue.
    pending_load: Option<LoadKind>,
}

impl AvatarEntity {
    #[must_use]
    pub fn new(key: EntityKey, name: impl Into<String>) -> Self {
        Self {
            key,
            id: EntityId::INVALID,
            name: name.into(),
            base: None,
            features: EntityFeatures::empty(),
            active: true,
            state: AvatarState::None,
            load_state: LoadingState::NotCreated,
            last_announced_load_state: LoadingState::NotCreated,
            versions: VersionedStateCache::new(),
            skeleton: SkeletonMirror::new(),
            renderables: RenderableRegistry::new(),
            animator: EntityAnimator::Default,
            joint_monitor: None,
            monitored_joint_types: Vec::new(),
            monitored_joint_poses: Vec::new(),
            critical_joint_types: Vec::new(),
            transform_skinning: false,
            fast_load: false,
            is_applying_models: false,
            load: None,
            pending_load: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Creates the runtime entity and the scene base node.
    ///
    /// The animator, joint monitor and skinning path are chosen from the
    /// context settings at this point.
    pub fn create<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) -> Result<EntityId> {
        if self.is_created() {
            return Err(SyncError::EntityAlreadyCreated(self.id));
        }

        let info = ctx.settings.entity_create_info();
        let id = ctx.runtime.create_entity(&info)?;
        self.state.transition(AvatarState::Created)?;

        self.id = id;
        self.features = info.features;
        self.base = Some(ctx.scene.add_node(self.name.clone()));

        self.animator = EntityAnimator::new(ctx.settings.uses_motion_smoothing());
        self.joint_monitor = ctx.settings.joint_monitor_kind().map(new_joint_monitor);
        self.transform_skinning = ctx.settings.uses_transform_skinning();
        self.critical_joint_types = ctx.settings.monitored_joint_types();
        self.fast_load = ctx.settings.fast_load;
        if self.joint_monitor.is_some() {
            self.monitored_joint_types.clone_from(&self.critical_joint_types);
        }

        self.load_state = LoadingState::Created;
        log::info!(
            "[{id}] Created entity '{}' (features {:?}, monitor {:?})",
            self.name,
            self.features,
            ctx.settings.joint_monitor_kind()
        );
        ctx.emit(id, &EntityEvent::Created);
        Ok(id)
    }

    /// Reverses every side effect of [`AvatarEntity::create`].
    ///
    /// A running load is dropped on the spot and its queue slot released.
    /// Afterwards all version pairs are invalid and the entity can be
    /// created again.
    pub fn teardown<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) {
        let id = self.id;
        if self.state != AvatarState::None {
            ctx.emit(id, &EntityEvent::PreTeardown);
        }

        if self.load.take().is_some() {
            log::debug!("[{id}] Stopping running load");
            ctx.load_queue.finished();
        }
        if self.pending_load.take().is_some() {
            ctx.load_queue.remove(self.key);
        }

        self.renderables.destroy_all(&mut ctx.scene);
        debug_assert_eq!(self.renderables.lods().container_count(), 0);
        debug_assert_eq!(self.renderables.lods().total_instance_count(), 0);

        if let Some(mut monitor) = self.joint_monitor.take() {
            monitor.dispose();
        }
        self.monitored_joint_types.clear();
        self.monitored_joint_poses.clear();

        self.skeleton.destroy(&mut ctx.scene);
        if let Some(base) = self.base.take() {
            ctx.scene.remove_subtree(base);
        }

        if id.is_valid()
            && let Err(e) = ctx.runtime.destroy_entity(id)
        {
            log::warn!("[{id}] Failed to destroy runtime entity: {e}");
        }

        self.load_state = LoadingState::NotCreated;
        self.last_announced_load_state = LoadingState::NotCreated;
        self.is_applying_models = false;
        self.state = AvatarState::None;
        self.versions.invalidate();
        self.animator = EntityAnimator::Default;
        self.id = EntityId::INVALID;
        log::info!("[{id}] Tore down entity '{}'", self.name);
    }

    /// Inactive entities skip the sync loop but keep their render update.
    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            log::debug!("[{}] active = {active}", self.id);
        }
        self.active = active;
    }

    /// Handles a runtime load request notification for this entity.
    pub fn on_load_request_state_changed<R: AvatarRuntime>(
        &mut self,
        ctx: &mut AvatarContext<R>,
        info: &LoadRequestInfo,
    ) {
        ctx.emit(self.id, &EntityEvent::LoadRequestStateChanged(info.clone()));
        if info.state == LoadRequestState::Failed {
            log::info!(
                "[{}] Load request {} failed ({})",
                self.id,
                info.id,
                info.failure.as_deref().unwrap_or("unknown reason")
            );
            ctx.emit(self.id, &EntityEvent::LoadFailed(info.clone()));
        }
    }

    /// Moves the lifecycle state forward and emits the matching event.
    fn advance_state<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>, next: AvatarState) -> bool {
        if let Err(e) = self.state.transition(next) {
            log::error!("[{}] {e}", self.id);
            return false;
        }
        log::info!("[{}] State -> {next:?}", self.id);
        let event = match next {
            AvatarState::Created => EntityEvent::Created,
            AvatarState::Skeleton => EntityEvent::SkeletonLoaded,
            AvatarState::DefaultAvatar => EntityEvent::DefaultAvatarLoaded,
            AvatarState::FastLoad => EntityEvent::FastLoadAvatarLoaded,
            AvatarState::UserAvatar => EntityEvent::UserAvatarLoaded,
            AvatarState::None => return true,
        };
        ctx.emit(self.id, &event);
        true
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn key(&self) -> EntityKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn is_created(&self) -> bool {
        self.id.is_valid()
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn base(&self) -> Option<NodeHandle> {
        self.base
    }

    #[must_use]
    pub fn features(&self) -> EntityFeatures {
        self.features
    }

    #[must_use]
    pub fn state(&self) -> AvatarState {
        self.state
    }

    #[must_use]
    pub fn load_state(&self) -> LoadingState {
        self.load_state
    }

    /// True while a load is queued or running.
    #[must_use]
    pub fn is_applying_models(&self) -> bool {
        self.is_applying_models
    }

    #[must_use]
    pub fn is_load_running(&self) -> bool {
        self.load.is_some()
    }

    #[must_use]
    pub fn is_load_pending(&self) -> bool {
        self.pending_load.is_some()
    }

    #[must_use]
    pub fn versions(&self) -> &VersionedStateCache {
        &self.versions
    }

    #[must_use]
    pub fn skeleton(&self) -> &SkeletonMirror {
        &self.skeleton
    }

    #[must_use]
    pub fn renderables(&self) -> &RenderableRegistry {
        &self.renderables
    }

    #[must_use]
    pub fn animator(&self) -> &EntityAnimator {
        &self.animator
    }

    #[must_use]
    pub fn has_joint_monitor(&self) -> bool {
        self.joint_monitor.is_some()
    }

    #[must_use]
    pub fn joint_monitor(&self) -> Option<&dyn JointMonitor> {
        self.joint_monitor.as_deref()
    }

    /// Output transform of a monitored joint.
    pub fn monitored_joint_transform(&mut self, joint_type: JointType) -> Option<JointTransform> {
        self.joint_monitor.as_mut()?.joint_transform(joint_type)
    }

    /// Scene node mirroring a joint type, when joints are mirrored as nodes.
    #[must_use]
    pub fn joint_node(&self, joint_type: JointType) -> Option<NodeHandle> {
        self.skeleton.transform_for_type(joint_type)
    }

    #[must_use]
    pub fn monitored_joint_types(&self) -> &[JointType] {
        &self.monitored_joint_types
    }

    #[must_use]
    pub fn monitored_joint_poses(&self) -> &[JointPose] {
        &self.monitored_joint_poses
    }

    // ========================================================================
    // LOD reporting
    // ========================================================================

    /// Visible cost of each LOD level, including all-LOD primitives.
    #[must_use]
    pub fn visible_lod_costs(&self) -> [LodCost; LOD_COUNT] {
        self.renderables.lods().visible_costs()
    }

    /// Highest numbered populated LOD level, or -1.
    #[must_use]
    pub fn lowest_quality_lod_index(&self) -> i32 {
        self.renderables.lods().lowest_quality_index()
    }

    /// Lowest numbered populated LOD level, or -1.
    #[must_use]
    pub fn highest_quality_lod_index(&self) -> i32 {
        self.renderables.lods().highest_quality_index()
    }
}

impl std::fmt::Debug for AvatarEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarEntity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("load_state", &self.load_state)
            .field("versions", &self.versions)
            .field("joints", &self.skeleton.len())
            .field("renderables", &self.renderables.renderable_count())
            .field("applying", &self.is_applying_models)
            .finish_non_exhaustive()
    }
}

fn new_joint_monitor(kind: JointMonitorKind) -> Box<dyn JointMonitor> {
    match kind {
        JointMonitorKind::Direct => Box::new(DirectJointMonitor::new()),
        JointMonitorKind::Smoothing => Box::new(SmoothingJointMonitor::new()),
        JointMonitorKind::Batched => Box::new(BatchedJointMonitor::new()),
    }
}
