//! Entity ownership and the per-tick driver.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::callbacks::{CallbackRegistry, ContextHandle};
use crate::config::SyncSettings;
use crate::context::{AvatarContext, EntityKey};
use crate::errors::{Result, SyncError};
use crate::runtime::ids::EntityId;
use crate::runtime::{AvatarRuntime, LoadRequestInfo};
use crate::sync::entity::{AvatarEntity, FrameOutcome, LoadProgress};
use crate::sync::events::EntityEvent;

/// Counts of what one [`AvatarManager::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub synced: usize,
    pub frozen: usize,
    pub pose_unavailable: usize,
    pub inactive: usize,
    pub loads_waiting: usize,
    pub loads_finished: usize,
    pub loads_started: usize,
}

/// Owns the shared context and every entity, and drives them in a fixed
/// order once per tick.
pub struct AvatarManager<R: AvatarRuntime> {
    ctx: AvatarContext<R>,
    entities: SlotMap<EntityKey, AvatarEntity>,
    /// Creation order; entities are ticked in this order.
    update_order: Vec<EntityKey>,
    callbacks: CallbackRegistry<EntityKey>,
    handles: FxHashMap<EntityKey, ContextHandle>,
}

impl<R: AvatarRuntime> AvatarManager<R> {
    pub fn new(runtime: R, settings: SyncSettings) -> Self {
        Self::with_context(AvatarContext::new(runtime, settings))
    }

    pub fn with_context(ctx: AvatarContext<R>) -> Self {
        Self {
            ctx,
            entities: SlotMap::with_key(),
            update_order: Vec::new(),
            callbacks: CallbackRegistry::new(),
            handles: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &AvatarContext<R> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut AvatarContext<R> {
        &mut self.ctx
    }

    /// Registers a listener for the events of every entity.
    pub fn subscribe(&mut self, listener: impl FnMut(EntityId, &EntityEvent) + Send + 'static) {
        self.ctx.events.subscribe(listener);
    }

    // ========================================================================
    // Entity lifecycle
    // ========================================================================

    /// Creates a runtime entity and returns its key together with the
    /// context handle the runtime should report load requests with.
    pub fn create_entity(&mut self, name: impl Into<String>) -> Result<(EntityKey, ContextHandle)> {
        let name = name.into();
        let key = self.entities.insert_with_key(|key| AvatarEntity::new(key, name));

        let created = match self.entities.get_mut(key) {
            Some(entity) => entity.create(&mut self.ctx),
            None => Err(SyncError::EntityNotCreated),
        };
        if let Err(e) = created {
            log::error!("Failed to create entity: {e}");
            self.entities.remove(key);
            return Err(e);
        }

        let handle = self.callbacks.register(key);
        self.handles.insert(key, handle);
        self.update_order.push(key);
        Ok((key, handle))
    }

    /// Tears down and forgets an entity. Returns false for unknown keys.
    pub fn destroy_entity(&mut self, key: EntityKey) -> bool {
        let Some(mut entity) = self.entities.remove(key) else {
            return false;
        };
        if let Some(handle) = self.handles.remove(&key)
            && let Err(e) = self.callbacks.unregister(handle)
        {
            log::warn!("Callback handle of '{}' was already gone: {e}", entity.name());
        }
        self.update_order.retain(|k| *k != key);
        entity.teardown(&mut self.ctx);
        true
    }

    /// Tears down every entity in reverse creation order and releases all
    /// callback handles.
    pub fn shutdown(&mut self) {
        let order = std::mem::take(&mut self.update_order);
        for key in order.into_iter().rev() {
            if let Some(mut entity) = self.entities.remove(key) {
                entity.teardown(&mut self.ctx);
            }
        }
        self.entities.clear();
        self.handles.clear();
        let released = self.callbacks.dispose_all();
        log::info!("Avatar manager shut down ({} handles released)", released.len());
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances every entity by one tick of `dt` seconds.
    ///
    /// All sync loops and render updates run first, then one load step per
    /// entity, then queued loads that were handed a slot start. World
    /// matrices are refreshed last.
    pub fn update(&mut self, dt: f32) -> TickSummary {
        let mut summary = TickSummary::default();
        self.ctx.tick(dt);

        for &key in &self.update_order {
            let Some(entity) = self.entities.get_mut(key) else {
                continue;
            };
            match entity.update(&mut self.ctx) {
                FrameOutcome::Synced => summary.synced += 1,
                FrameOutcome::Frozen => summary.frozen += 1,
                FrameOutcome::PoseUnavailable => summary.pose_unavailable += 1,
                FrameOutcome::Inactive => summary.inactive += 1,
            }
        }

        for &key in &self.update_order {
            let Some(entity) = self.entities.get_mut(key) else {
                continue;
            };
            match entity.advance_loading(&mut self.ctx) {
                LoadProgress::Waiting => summary.loads_waiting += 1,
                LoadProgress::Finished => summary.loads_finished += 1,
                LoadProgress::Idle | LoadProgress::Queued => {}
            }
        }

        for key in self.ctx.load_queue.take_granted() {
            let started = self
                .entities
                .get_mut(key)
                .is_some_and(AvatarEntity::start_granted_load);
            if started {
                summary.loads_started += 1;
            } else {
                self.ctx.load_queue.finished();
            }
        }

        self.ctx.scene.update_world_matrices();
        summary
    }

    // ========================================================================
    // Runtime callbacks
    // ========================================================================

    /// Routes a load request notification to the entity registered under
    /// `handle`.
    pub fn dispatch_load_request(&mut self, handle: ContextHandle, info: &LoadRequestInfo) -> Result<()> {
        let key = self.callbacks.get(handle).ok_or(SyncError::UnknownHandle(handle))?;
        let entity = self.entities.get_mut(key).ok_or(SyncError::EntityNotCreated)?;
        entity.on_load_request_state_changed(&mut self.ctx, info);
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn entity(&self, key: EntityKey) -> Option<&AvatarEntity> {
        self.entities.get(key)
    }

    pub fn entity_mut(&mut self, key: EntityKey) -> Option<&mut AvatarEntity> {
        self.entities.get_mut(key)
    }

    #[must_use]
    pub fn handle(&self, key: EntityKey) -> Option<ContextHandle> {
        self.handles.get(&key).copied()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = &AvatarEntity> + '_ {
        self.update_order.iter().filter_map(|k| self.entities.get(*k))
    }

    #[must_use]
    pub fn callbacks(&self) -> &CallbackRegistry<EntityKey> {
        &self.callbacks
    }
}

impl<R: AvatarRuntime> std::fmt::Debug for AvatarManager<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarManager")
            .field("entities", &self.entities.len())
            .field("callbacks", &self.callbacks)
            .field("load_queue", &self.ctx.load_queue)
            .finish_non_exhaustive()
    }
}
