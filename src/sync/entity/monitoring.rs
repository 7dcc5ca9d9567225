//! Joint monitoring and animation sampling.
//!
//! Sampling writes the runtime pose into the mirror: skinning origins,
//! joint transforms (all joints, or only the critical ones when nothing is
//! skinned through scene nodes) and morph target weights. Monitored joints
//! are fed from object-space transforms instead of scene nodes.

use glam::{Quat, Vec3};

use super::AvatarEntity;
use crate::context::AvatarContext;
use crate::runtime::AvatarRuntime;
use crate::runtime::ids::{EntityFeatures, JointType};
use crate::runtime::pose::{Pose, RenderState};
use crate::scene::{RenderableKey, SceneGraph};
use crate::sync::joint_monitor::JointPose;

impl AvatarEntity {
    // ========================================================================
    // Monitored joint set
    // ========================================================================

    /// Starts monitoring `joint_type`. Returns false without a joint monitor
    /// or when the type is already monitored.
    pub fn add_monitored_joint(&mut self, joint_type: JointType) -> bool {
        if self.joint_monitor.is_none() || self.monitored_joint_types.contains(&joint_type) {
            return false;
        }
        self.monitored_joint_types.push(joint_type);
        if let Some(index) = self.skeleton.index_for_type(joint_type) {
            self.monitored_joint_poses.push(JointPose::new(joint_type, index));
        }
        true
    }

    /// Stops feeding `joint_type` to the joint monitor. Its last output stays
    /// readable until the skeleton no longer has the joint.
    pub fn remove_monitored_joint(&mut self, joint_type: JointType) -> bool {
        let before = self.monitored_joint_types.len();
        self.monitored_joint_types.retain(|&t| t != joint_type);
        self.monitored_joint_poses.retain(|p| p.joint_type != joint_type);
        self.monitored_joint_types.len() != before
    }

    /// Rebuilds the pose list from the monitored types the skeleton has.
    pub(crate) fn refresh_monitored_joint_poses(&mut self) {
        let skeleton = &self.skeleton;
        self.monitored_joint_poses = self
            .monitored_joint_types
            .iter()
            .filter_map(|&t| skeleton.index_for_type(t).map(|index| JointPose::new(t, index)))
            .collect();
    }

    /// Feeds the current object-space poses to the joint monitor.
    ///
    /// Joints without a usable object transform fall back to the base node's
    /// local transform.
    pub(crate) fn monitor_joints(&mut self, pose: &Pose, scene: &SceneGraph) {
        let Some(monitor) = self.joint_monitor.as_mut() else {
            return;
        };
        if self.monitored_joint_poses.is_empty() {
            return;
        }

        let fallback = self
            .base
            .and_then(|base| scene.local_transform(base))
            .map_or((Vec3::ZERO, Quat::IDENTITY), |t| (t.position, t.orientation));

        if let Some(object_transforms) = &pose.object_transforms {
            for joint in &mut self.monitored_joint_poses {
                match object_transforms.get(joint.joint_index as usize) {
                    Some(transform) if !transform.is_nan() => {
                        *joint = joint.with_transform(&transform.convert_space());
                    }
                    _ => {
                        joint.position = fallback.0;
                        joint.orientation = fallback.1;
                    }
                }
            }
        }

        let skeleton = &self.skeleton;
        monitor.on_joint_poses_updated(&self.monitored_joint_poses, &|t: JointType| {
            skeleton.node_for_type(t).is_valid()
        });
    }

    // ========================================================================
    // Sampling
    // ========================================================================

    /// Samples one animation frame from the runtime into the mirror.
    pub(crate) fn sample_animation_frame<R: AvatarRuntime>(
        &mut self,
        ctx: &mut AvatarContext<R>,
        pose: &Pose,
        render_state: Option<&RenderState>,
    ) {
        let skeletal = self.features.intersects(EntityFeatures::UPDATE_POSE);
        let morphs = self.features.intersects(EntityFeatures::UPDATE_MORPHS);

        if skeletal || morphs {
            let animatable: Vec<RenderableKey> = self
                .renderables
                .visible_renderables()
                .filter(|data| {
                    ctx.scene
                        .renderable(data.renderable)
                        .is_some_and(|r| r.visible && r.is_skinned() && r.animation_enabled)
                })
                .map(|data| data.renderable)
                .collect();
            for &key in &animatable {
                if let Some(renderable) = ctx.scene.renderable_mut(key) {
                    renderable.animation_frame_started();
                }
            }

            if skeletal {
                self.sample_pose(ctx, pose, render_state, !animatable.is_empty());
            }
            if morphs {
                self.sample_morph_targets(ctx);
            }
        }

        self.monitor_joints(pose, &ctx.scene);
        self.animator
            .add_animation_frame(ctx.clock.elapsed_seconds(), ctx.clock.dt_seconds());
    }

    fn sample_pose<R: AvatarRuntime>(
        &mut self,
        ctx: &mut AvatarContext<R>,
        pose: &Pose,
        render_state: Option<&RenderState>,
        has_animatable: bool,
    ) {
        if let Some(state) = render_state
            && self.features.contains(EntityFeatures::RENDERING_PRIMS)
        {
            self.sample_skinning_origins(ctx, state);
        }

        if pose.joint_count() != self.skeleton.len() {
            log::warn!(
                "[{}] Pose has {} joints but the skeleton has {}",
                self.id,
                pose.joint_count(),
                self.skeleton.len()
            );
        }

        if self.joint_monitor.is_some() {
            return;
        }

        if self.transform_skinning && has_animatable {
            for index in 0..self.skeleton.len() {
                self.skeleton.apply_pose_at(index, pose, &mut ctx.scene);
            }
        } else {
            for &index in self.skeleton.update_joint_indices() {
                self.skeleton.apply_pose_at(index as usize, pose, &mut ctx.scene);
            }
        }
    }

    /// Moves non-skinned renderables to their origin and records the
    /// skinning origin of skinned ones.
    fn sample_skinning_origins<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>, state: &RenderState) {
        for index in 0..state.primitive_count {
            let prim = match ctx.runtime.query_primitive_render_state(self.id, index) {
                Ok(prim) => prim,
                Err(e) => {
                    log::trace!("[{}] No render state for primitive {index}: {e}", self.id);
                    continue;
                }
            };
            let Some(key) = self.renderables.renderable_for_instance(prim.instance_id) else {
                continue;
            };
            let origin = prim.skinning_origin.with_mirrored_z_scale().convert_space();

            let Some(renderable) = ctx.scene.renderable_mut(key) else {
                continue;
            };
            if renderable.is_skinned() {
                renderable.skinning_origin = origin;
            } else {
                let node = renderable.node;
                ctx.scene.set_local_transform(node, &origin);
            }
        }
    }

    fn sample_morph_targets<R: AvatarRuntime>(&mut self, ctx: &mut AvatarContext<R>) {
        for data in self.renderables.visible_renderables() {
            let Some(renderable) = ctx.scene.renderable_mut(data.renderable) else {
                continue;
            };
            if !renderable.has_morph_targets() {
                continue;
            }
            if let Err(e) =
                ctx.runtime
                    .morph_target_weights(self.id, data.instance_id, &mut renderable.morph_weights)
            {
                log::error!("[{}] Failed to read morph weights of {}: {e}", self.id, data.instance_id);
            }
        }
    }
}
