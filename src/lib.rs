#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod assets;
pub mod callbacks;
pub mod config;
pub mod context;
pub mod errors;
pub mod manager;
pub mod runtime;
pub mod scene;
pub mod sync;
pub mod utils;

pub use assets::{AssetStatus, PrimitiveAsset, PrimitiveCache};
pub use callbacks::{CallbackRegistry, ContextHandle};
pub use config::{JointMonitorKind, SyncSettings};
pub use context::{AvatarContext, EntityKey};
pub use errors::{Result, SyncError};
pub use manager::{AvatarManager, TickSummary};
pub use runtime::ids::{EntityFeatures, EntityId, JointType, LodFlags, NodeId, PrimitiveId};
pub use runtime::pose::{JointTransform, Pose, PrimitiveRenderState, RenderState};
pub use runtime::{AvatarRuntime, MemoryRuntime};
pub use scene::{NodeHandle, RenderableKey, SceneGraph};
pub use sync::{AvatarEntity, AvatarState, EntityEvent, FrameOutcome, LoadingState};
pub use utils::FrameClock;
