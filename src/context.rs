//! Shared state handed to every entity.
//!
//! One [`AvatarContext`] is built explicitly by the host and passed by
//! reference into every entity call. It owns the runtime, the scene the
//! entities mirror into, the primitive cache, admission of load attempts
//! and the event fan-out.

use std::sync::Arc;

use slotmap::new_key_type;

use crate::assets::PrimitiveCache;
use crate::config::SyncSettings;
use crate::runtime::AvatarRuntime;
use crate::runtime::ids::EntityId;
use crate::scene::SceneGraph;
use crate::sync::events::{EntityEvent, EventDispatcher};
use crate::sync::load_queue::LoadQueue;
use crate::utils::FrameClock;

new_key_type! {
    /// Key of an entity in its owner's slot map.
    pub struct EntityKey;
}

pub struct AvatarContext<R: AvatarRuntime> {
    pub runtime: R,
    pub assets: Arc<PrimitiveCache>,
    pub scene: SceneGraph,
    pub settings: SyncSettings,
    pub load_queue: LoadQueue<EntityKey>,
    pub clock: FrameClock,
    pub events: EventDispatcher,
}

impl<R: AvatarRuntime> AvatarContext<R> {
    pub fn new(runtime: R, settings: SyncSettings) -> Self {
        Self::with_assets(runtime, settings, Arc::new(PrimitiveCache::new()))
    }

    /// Builds a context that shares an existing primitive cache.
    pub fn with_assets(runtime: R, settings: SyncSettings, assets: Arc<PrimitiveCache>) -> Self {
        log::info!(
            "Avatar context: gpu_skinning={} motion_smoothing={} max_concurrent_loads={}",
            settings.gpu_skinning,
            settings.uses_motion_smoothing(),
            settings.max_concurrent_loads
        );
        Self {
            runtime,
            assets,
            scene: SceneGraph::new(),
            load_queue: LoadQueue::new(settings.max_concurrent_loads),
            settings,
            clock: FrameClock::new(),
            events: EventDispatcher::new(),
        }
    }

    /// Advances the frame clock by `dt` seconds.
    #[inline]
    pub fn tick(&mut self, dt: f32) {
        self.clock.tick(dt);
    }

    #[inline]
    pub(crate) fn emit(&mut self, entity: EntityId, event: &EntityEvent) {
        self.events.emit(entity, event);
    }
}

impl<R: AvatarRuntime + std::fmt::Debug> std::fmt::Debug for AvatarContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarContext")
            .field("runtime", &self.runtime)
            .field("settings", &self.settings)
            .field("load_queue", &self.load_queue)
            .field("clock", &self.clock)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
