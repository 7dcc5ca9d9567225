//! Synchronization settings.
//!
//! [`SyncSettings`] is read once when an [`AvatarContext`](crate::context::AvatarContext)
//! is built. Every entity created through that context derives its animator,
//! joint monitor and skinning path from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::runtime::EntityCreateInfo;
use crate::runtime::ids::{EntityFeatures, JointType};
use crate::sync::load_queue::DEFAULT_MAX_CONCURRENT_LOADS;

/// Which joint monitor an entity uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointMonitorKind {
    /// Outputs follow the latest pose.
    Direct,
    /// Outputs interpolate between the two latest poses.
    Smoothing,
    /// Smoothing with the output writes run as a parallel job.
    Batched,
}

/// Global configuration for avatar synchronization.
///
/// # Fields
///
/// | Field                  | Description                                         | Default                 |
/// |------------------------|-----------------------------------------------------|-------------------------|
/// | `gpu_skinning`         | Renderables skin on the GPU from runtime matrices   | `true`                  |
/// | `motion_smoothing`     | Interpolate between the two latest frames           | `true`                  |
/// | `critical_joint_jobs`  | Run monitored joint writes as a parallel job        | `false`                 |
/// | `critical_joint_types` | Joints that must stay up to date every frame        | empty                   |
/// | `center_joint`         | Joint LOD distance is measured from                 | `Some(Hips)`            |
/// | `cull_joints`          | Joints used as culling reference points             | head and both wrists    |
/// | `max_concurrent_loads` | Cap on load attempts running at once                | `64`                    |
/// | `fast_load`            | Load a reduced avatar first, then the full one      | `false`                 |
/// | `features`             | Entity features requested at creation               | `PRESET_DEFAULT`        |
///
/// # Example
///
/// ```rust,ignore
/// use avatar_sync::config::SyncSettings;
///
/// let settings = SyncSettings {
///     motion_smoothing: false,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub gpu_skinning: bool,
    /// Only honoured together with `gpu_skinning`.
    pub motion_smoothing: bool,
    pub critical_joint_jobs: bool,
    pub critical_joint_types: Vec<JointType>,
    pub center_joint: Option<JointType>,
    pub cull_joints: Vec<JointType>,
    pub max_concurrent_loads: usize,
    pub fast_load: bool,
    pub features: EntityFeatures,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            gpu_skinning: true,
            motion_smoothing: true,
            critical_joint_jobs: false,
            critical_joint_types: Vec::new(),
            center_joint: Some(JointType::Hips),
            cull_joints: vec![JointType::Head, JointType::LeftHandWrist, JointType::RightHandWrist],
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
            fast_load: false,
            features: EntityFeatures::PRESET_DEFAULT,
        }
    }
}

impl SyncSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&text)?;
        log::info!("Loaded sync settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Motion smoothing is only available with GPU skinning.
    #[inline]
    #[must_use]
    pub fn uses_motion_smoothing(&self) -> bool {
        self.gpu_skinning && self.motion_smoothing
    }

    /// Joint monitor for new entities; `None` mirrors the skeleton as nodes.
    #[must_use]
    pub fn joint_monitor_kind(&self) -> Option<JointMonitorKind> {
        if !self.gpu_skinning {
            return None;
        }
        Some(if !self.motion_smoothing {
            JointMonitorKind::Direct
        } else if self.critical_joint_jobs {
            JointMonitorKind::Batched
        } else {
            JointMonitorKind::Smoothing
        })
    }

    /// Transform skinned renderables read every joint node each frame.
    #[inline]
    #[must_use]
    pub fn uses_transform_skinning(&self) -> bool {
        !self.gpu_skinning
    }

    /// Critical joint types plus the center and cull joints, deduplicated.
    #[must_use]
    pub fn monitored_joint_types(&self) -> Vec<JointType> {
        let mut types = self.critical_joint_types.clone();
        types.extend(self.center_joint);
        types.extend(self.cull_joints.iter().copied());
        let mut seen = rustc_hash::FxHashSet::default();
        types.retain(|jt| seen.insert(*jt));
        types
    }

    /// Creation parameters with the features the skinning path depends on.
    #[must_use]
    pub fn entity_create_info(&self) -> EntityCreateInfo {
        let mut features = self.features;
        if self.gpu_skinning && !features.contains(EntityFeatures::RENDERING_OBJECT_SPACE_TRANSFORMS) {
            log::warn!("RENDERING_OBJECT_SPACE_TRANSFORMS force enabled due to GPU skinning");
            features |= EntityFeatures::RENDERING_OBJECT_SPACE_TRANSFORMS;
        }
        if features.contains(EntityFeatures::RENDERING_PRIMS)
            && !features.contains(EntityFeatures::RENDERING_SKINNING_MATRICES)
        {
            log::warn!("RENDERING_SKINNING_MATRICES force enabled due to RENDERING_PRIMS");
            features |= EntityFeatures::RENDERING_SKINNING_MATRICES;
        }
        EntityCreateInfo {
            features,
            ..EntityCreateInfo::default()
        }
    }
}
