//! Synchronization engine.
//!
//! - [`entity`]: the per-avatar aggregate and its sync loop
//! - [`versions`]: current/target tracking of runtime version tokens
//! - [`state`]: lifecycle and loading state machines
//! - [`skeleton`]: joint hierarchy mirrored as scene nodes
//! - [`renderables`]: mesh node bindings and visibility
//! - [`lod`]: per-LOD containers and cost accounting
//! - [`loader`]: primitive load gating and renderable construction
//! - [`load_queue`]: bounded admission of load attempts
//! - [`animator`]: animation time and interpolation
//! - [`joint_monitor`]: joint output without scene nodes
//! - [`events`]: lifecycle notifications

pub mod animator;
pub mod entity;
pub mod events;
pub mod joint_monitor;
pub mod load_queue;
pub mod loader;
pub mod lod;
pub mod renderables;
pub mod skeleton;
pub mod state;
pub mod versions;

pub use animator::{EntityAnimator, InterpolationValueProvider, MotionSmoothingAnimator};
pub use entity::{AvatarEntity, FrameOutcome, LoadProgress};
pub use events::{EntityEvent, EventDispatcher};
pub use joint_monitor::{JointMonitor, JointPose};
pub use load_queue::LoadQueue;
pub use loader::{LoadKind, SliceStep};
pub use lod::{LodBuckets, LodCost};
pub use renderables::{PrimitiveRenderData, RenderableRegistry};
pub use skeleton::SkeletonMirror;
pub use state::{AvatarState, LoadingState};
pub use versions::{VersionPair, VersionedStateCache};
