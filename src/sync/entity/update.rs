//! Per-frame sync loop.

use super::AvatarEntity;
use super::loading::announce_renderables;
use crate::context::AvatarContext;
use crate::runtime::AvatarRuntime;
use crate::runtime::ids::EntityFeatures;
use crate::runtime::pose::RenderState;
use crate::sync::animator::InterpolationValueProvider;
use crate::sync::events::EntityEvent;
use crate::sync::loader::{BuildTargets, LoadKind, LoadPipeline};
use crate::sync::state::LoadingState;

/// What the sync loop did with the entity this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not created or not active; only the render update ran.
    Inactive,
    /// The runtime had no pose or render state this frame.
    PoseUnavailable,
    /// The mirror is out of date and waits for a load; animation was not
    /// sampled.
    Frozen,
    /// The mirror matched the runtime and a frame was sampled.
    Synced,
}

impl AvatarEntity {
    /// Runs one frame of the sync loop.
    pub fn update<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) -> FrameOutcome {
        if !self.is_created() {
            return FrameOutcome::Inactive;
        }

        if self.is_applying_models {
            self.check_runtime_status(ctx);
        }

        let outcome = if self.active {
            self.entity_active_render_update(ctx)
        } else {
            FrameOutcome::Inactive
        };

        self.per_frame_render_update(ctx);
        self.announce_load_state(ctx);
        outcome
    }

    fn check_runtime_status<R: AvatarRuntime>(&mut self, ctx: &AvatarContext<R>) {
        let status = ctx.runtime.entity_status(self.id);
        if status.is_load_failure() {
            log::warn!("[{}] Runtime reported {status:?} while loading", self.id);
            self.load_state = LoadingState::Failed;
            self.is_applying_models = false;
        }
    }

    fn announce_load_state<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) {
        if self.load_state == self.last_announced_load_state {
            return;
        }
        self.last_announced_load_state = self.load_state;
        ctx.emit(self.id, &EntityEvent::LoadingStateChanged(self.load_state));
    }

    fn entity_active_render_update<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) -> FrameOutcome {
        let pose = match ctx.runtime.query_pose(self.id) {
            Ok(pose) => pose,
            Err(e) => {
                log::debug!("[{}] No pose this frame: {e}", self.id);
                return FrameOutcome::PoseUnavailable;
            }
        };

        let render_state = if self.features.contains(EntityFeatures::RENDERING_PRIMS) {
            match ctx.runtime.query_render_state(self.id) {
                Ok(state) => Some(state),
                Err(e) => {
                    log::debug!("[{}] No render state this frame: {e}", self.id);
                    return FrameOutcome::PoseUnavailable;
                }
            }
        } else {
            None
        };

        let hierarchy_version = pose.hierarchy_version;
        if self.versions.hierarchy.is_stale(hierarchy_version) {
            if self.versions.hierarchy.target() != hierarchy_version && !self.load_in_flight() {
                log::debug!(
                    "[{}] Hierarchy changed {} -> {hierarchy_version}",
                    self.id,
                    self.versions.hierarchy.current()
                );
                self.versions.hierarchy.observe(hierarchy_version);
                self.queue_load(ctx, LoadKind::SkeletonAndPrimitives);
            }
            if let Some(state) = &render_state {
                self.update_all_nodes(state, &mut ctx.scene);
            }
            return FrameOutcome::Frozen;
        }

        if let Some(state) = &render_state
            && self.versions.visible_nodes.is_stale(state.visible_nodes_version)
            && !self.sync_visible_nodes(ctx, state)
        {
            self.update_all_nodes(state, &mut ctx.scene);
            return FrameOutcome::Frozen;
        }

        if let Some(state) = &render_state {
            self.update_all_nodes(state, &mut ctx.scene);
        }

        self.sample_animation_frame(ctx, &pose, render_state.as_ref());
        FrameOutcome::Synced
    }

    /// Builds renderables that became ready and applies the visible list.
    /// Returns false while primitive assets are still loading.
    fn sync_visible_nodes<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>, state: &RenderState) -> bool {
        self.versions.visible_nodes.observe(state.visible_nodes_version);
        let Some(base) = self.base else {
            return false;
        };

        let pipeline = LoadPipeline::new(&ctx.runtime, self.id, &ctx.assets);
        let result = pipeline.check_for_new_renderables(&self.renderables, state.primitive_count);

        if let Some(e) = &result.failure {
            log::error!("[{}] Primitive check failed: {e}", self.id);
            self.load_state = LoadingState::Failed;
        }

        if result.is_waiting() {
            log::trace!(
                "[{}] {} primitive assets still loading",
                self.id,
                result.new_primitive_ids.len()
            );
            if !self.load_in_flight() {
                self.queue_load(ctx, LoadKind::Primitives);
            }
            return false;
        }

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
            if let Some(e) = &report.failure {
                log::warn!("[{}] Some renderables were not built: {e}", self.id);
            }
        }

        self.apply_visibility(state, &mut ctx.scene);
        true
    }

    /// Advances animation time and pushes the interpolation value to every
    /// renderable. Runs for inactive entities too.
    fn per_frame_render_update<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) {
        let dt = ctx.clock.dt_seconds();

        let mut all_valid = true;
        for data in self.renderables.visible_renderables() {
            if let Some(renderable) = ctx.scene.renderable(data.renderable)
                && renderable.is_skinned()
                && renderable.animation_enabled
            {
                all_valid &= renderable.is_animation_data_complete();
            }
        }
        self.animator.update_animation_time(dt, all_valid);

        if let Some(monitor) = self.joint_monitor.as_mut() {
            monitor.update_joints(&self.animator);
        }

        let value = self.animator.render_interpolation_value();
        for data in self.renderables.all_renderables() {
            if let Some(renderable) = ctx.scene.renderable_mut(data.renderable) {
                renderable.render_frame_update(value);
            }
        }
    }
}
