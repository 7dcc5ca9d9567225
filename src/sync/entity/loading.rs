//! Resumable load work: skeleton rebuilds and primitive builds.
//!
//! A load is queued by the sync loop, admitted by the context's
//! [`LoadQueue`](crate::sync::load_queue::LoadQueue) and then stepped once
//! per tick by [`AvatarEntity::advance_loading`] until it finalizes. Each
//! phase either completes within the tick or yields without keeping partial
//! results.

use super::AvatarEntity;
use crate::context::AvatarContext;
use crate::runtime::ids::{EntityId, JointType};
use crate::runtime::pose::{Pose, RenderState};
use crate::runtime::{AvatarRuntime, EntityAssetType};
use crate::scene::SceneGraph;
use crate::sync::events::{EntityEvent, EventDispatcher};
use crate::sync::loader::{
    BuildReport, BuildTargets, LoadKind, LoadPhase, LoadPipeline, LoadTask, SliceStep,
};
use crate::sync::state::{AvatarState, LoadingState};

/// Result of stepping the load work of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadProgress {
    /// Nothing is running.
    Idle,
    /// A load is queued behind other entities.
    Queued,
    /// The running load yielded and continues next tick.
    Waiting,
    /// The running load finalized this tick.
    Finished,
}

impl AvatarEntity {
    // ========================================================================
    // Queueing
    // ========================================================================

    /// Requests a load of `kind`. Starts it right away when the load queue
    /// has room, otherwise leaves it pending until a slot is granted.
    pub(crate) fn queue_load<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>, kind: LoadKind) {
        if let Some(task) = &self.load {
            log::debug!("[{}] Load {:?} already running, not queueing {kind:?}", self.id, task.kind);
            return;
        }
        self.load_state = LoadingState::Loading;
        self.is_applying_models = true;

        if let Some(pending) = self.pending_load.as_mut() {
            if kind == LoadKind::SkeletonAndPrimitives {
                *pending = kind;
            }
            return;
        }

        if ctx.load_queue.request(self.key) {
            log::debug!("[{}] Starting load {kind:?}", self.id);
            self.load = Some(LoadTask::new(kind));
        } else {
            log::debug!("[{}] Load {kind:?} queued", self.id);
            self.pending_load = Some(kind);
        }
    }

    /// True while a model apply is flagged or a load is queued or running.
    pub(crate) fn load_in_flight(&self) -> bool {
        self.is_applying_models || self.load.is_some() || self.pending_load.is_some()
    }

    /// Starts the pending load after the load queue handed this entity a
    /// slot. Returns false when nothing was pending.
    pub fn start_granted_load(&mut self) -> bool {
        let Some(kind) = self.pending_load.take() else {
            return false;
        };
        log::debug!("[{}] Load slot granted, starting {kind:?}", self.id);
        self.load = Some(LoadTask::new(kind));
        true
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Runs the current load until it yields or finishes.
    pub fn advance_loading<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) -> LoadProgress {
        let Some(mut task) = self.load.take() else {
            return if self.pending_load.is_some() {
                LoadProgress::Queued
            } else {
                LoadProgress::Idle
            };
        };
        task.steps += 1;

        loop {
            match task.phase {
                LoadPhase::BuildSkeleton => {
                    if self.load_build_skeleton(ctx) != SliceStep::Continue {
                        self.load = Some(task);
                        return LoadProgress::Waiting;
                    }
                    task.phase = LoadPhase::BuildPrimitives;
                }
                LoadPhase::BuildPrimitives => match self.load_build_primitives(ctx) {
                    SliceStep::Delay => {
                        self.load = Some(task);
                        return LoadProgress::Waiting;
                    }
                    SliceStep::Continue | SliceStep::Cancel => task.phase = LoadPhase::Finalize,
                },
                LoadPhase::Finalize => {
                    self.finalize_load(ctx);
                    log::debug!("[{}] Load {:?} finished after {} ticks", self.id, task.kind, task.steps);
                    return LoadProgress::Finished;
                }
            }
        }
    }

    fn load_build_skeleton<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) -> SliceStep {
        let pose = match ctx.runtime.query_pose(self.id) {
            Ok(pose) => pose,
            Err(e) => {
                log::error!("[{}] Failed to query entity pose for building skeleton: {e}", self.id);
                return SliceStep::Delay;
            }
        };

        self.build_skeleton(ctx, &pose);

        if self.state == AvatarState::Created && !self.skeleton.is_empty() {
            self.advance_state(ctx, AvatarState::Skeleton);
        }
        SliceStep::Continue
    }

    /// Rebuilds the skeleton mirror against `pose` and commits its
    /// hierarchy version.
    pub(crate) fn build_skeleton<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>, pose: &Pose) {
        let Some(base) = self.base else {
            return;
        };
        let version = pose.hierarchy_version;
        self.versions.hierarchy.observe(version);

        let entity = self.id;
        let runtime = &ctx.runtime;
        let report = self.skeleton.rebuild(
            pose,
            |node| runtime.node_name(entity, node),
            &mut ctx.scene,
            base,
            self.joint_monitor.is_none(),
        );
        log::debug!(
            "[{entity}] Skeleton v{version}: {} created, {} reused, {} destroyed",
            report.created,
            report.reused,
            report.destroyed.len()
        );

        if pose.joint_count() == 0 {
            self.skeleton.set_joint_type_nodes(&[], &[]);
        } else {
            match ctx.runtime.query_joint_type_nodes(entity, &JointType::ALL) {
                Ok(nodes) => {
                    self.skeleton.set_joint_type_nodes(&JointType::ALL, &nodes);
                }
                Err(e) => {
                    log::error!("[{entity}] Joint type query failed: {e}");
                    self.skeleton.set_joint_type_nodes(&[], &[]);
                }
            }
        }

        if self.joint_monitor.is_some() {
            self.refresh_monitored_joint_poses();
            self.monitor_joints(pose, &ctx.scene);
            self.skeleton.clear_update_joints();
        } else if self.skeleton.is_empty() {
            self.skeleton.clear_update_joints();
        } else {
            let critical = self.skeleton.compute_critical_joints(&self.critical_joint_types);
            log::trace!("[{entity}] {} critical joints", critical.len());
        }

        self.versions.hierarchy.commit(version);
    }

    fn load_build_primitives<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) -> SliceStep {
        let Some(base) = self.base else {
            return SliceStep::Cancel;
        };
        let pipeline = LoadPipeline::new(&ctx.runtime, self.id, &ctx.assets);

        let (step, result) = pipeline.check_primitives_loaded(&self.renderables);
        match step {
            SliceStep::Cancel => {
                if let Some(e) = &result.failure {
                    log::error!("[{}] Primitive load cancelled: {e}", self.id);
                }
                self.load_state = LoadingState::Failed;
                return SliceStep::Cancel;
            }
            SliceStep::Delay => {
                log::trace!(
                    "[{}] Waiting on {} primitive assets",
                    self.id,
                    result.new_primitive_ids.len()
                );
                return SliceStep::Delay;
            }
            SliceStep::Continue => {}
        }

        let render_state = match ctx.runtime.query_render_state(self.id) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("[{}] Render state unavailable for building primitives: {e}", self.id);
                return SliceStep::Delay;
            }
        };

        if result.has_new_renderables() {
            let mut targets = BuildTargets {
                registry: &mut self.renderables,
                skeleton: &self.skeleton,
                scene: &mut ctx.scene,
                base,
                required_animation_frames: self.animator.required_animation_frames(),
            };
            let report = pipeline.build_new_renderables(&result.new_render_indices, &mut targets);
            announce_renderables(&mut ctx.events, self.id, &report);
            if !report.built_all() {
                return SliceStep::Delay;
            }
        }

        self.apply_visibility(&render_state, &mut ctx.scene);
        SliceStep::Continue
    }

    fn finalize_load<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) {
        self.check_loaded_assets(ctx);

        if self.load_state != LoadingState::Failed && self.state == AvatarState::UserAvatar {
            self.load_state = LoadingState::Success;
        }
        self.is_applying_models = false;
        ctx.load_queue.finished();
    }

    /// Advances the lifecycle state from the asset types the runtime has
    /// loaded on this entity.
    fn check_loaded_assets<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) {
        let asset_types = match ctx.runtime.loaded_asset_types(self.id) {
            Ok(types) => types,
            Err(e) => {
                log::warn!("[{}] Could not query loaded asset types: {e}", self.id);
                return;
            }
        };
        let has_default_model = asset_types.contains(&EntityAssetType::SystemDefaultModel);
        let has_user_model = asset_types.contains(&EntityAssetType::Other);

        if (has_default_model || has_user_model) && !self.state.has_skeleton() {
            log::warn!("[{}] Model loaded before any skeleton", self.id);
        }

        if self.state == AvatarState::Skeleton && has_default_model {
            self.advance_state(ctx, AvatarState::DefaultAvatar);
        }

        if has_default_model
            && has_user_model
            && let Err(e) = ctx.runtime.unload_default_model(self.id)
        {
            log::warn!("[{}] Failed to unload default model: {e}", self.id);
        }

        if self.fast_load && self.state < AvatarState::FastLoad && has_user_model {
            self.advance_state(ctx, AvatarState::FastLoad);
        } else if self.state < AvatarState::UserAvatar && has_user_model {
            self.advance_state(ctx, AvatarState::UserAvatar);
        }
    }

    // ========================================================================
    // Shared with the sync loop
    // ========================================================================

    /// Applies the visible node list and commits the visible version.
    pub(crate) fn apply_visibility(&mut self, state: &RenderState, scene: &mut SceneGraph) {
        let report = self.renderables.update_visibility(state, scene);
        if report.shown + report.hidden > 0 {
            log::trace!(
                "[{}] Visibility: {} shown, {} hidden",
                self.id,
                report.shown,
                report.hidden
            );
        }
        if !report.unmatched.is_empty() {
            log::warn!(
                "[{}] {} visible nodes were left hidden: {:?}",
                self.id,
                report.unmatched.len(),
                report.unmatched
            );
        }
        self.versions.visible_nodes.commit(state.visible_nodes_version);
    }

    /// Destroys renderables of mesh nodes that left the all-nodes list.
    pub(crate) fn update_all_nodes(&mut self, state: &RenderState, scene: &mut SceneGraph) {
        if !self.versions.all_nodes.is_stale(state.all_nodes_version) {
            return;
        }
        self.versions.all_nodes.observe(state.all_nodes_version);
        let removed = self.renderables.remove_stale_nodes(&state.all_mesh_nodes, scene);
        if !removed.is_empty() {
            log::debug!("[{}] Removed {} mesh nodes", self.id, removed.len());
        }
        self.versions.all_nodes.commit(state.all_nodes_version);
    }
}

pub(super) fn announce_renderables(events: &mut EventDispatcher, entity: EntityId, report: &BuildReport) {
    for data in &report.built {
        events.emit(
            entity,
            &EntityEvent::RenderableCreated {
                renderable: data.renderable,
                primitive: data.primitive_id,
            },
        );
    }
}
