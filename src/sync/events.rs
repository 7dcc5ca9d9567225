//! Lifecycle notifications.

use crate::runtime::LoadRequestInfo;
use crate::runtime::ids::{EntityId, PrimitiveId};
use crate::scene::RenderableKey;
use crate::sync::state::LoadingState;

/// Something that happened to an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent {
    Created,
    SkeletonLoaded,
    DefaultAvatarLoaded,
    FastLoadAvatarLoaded,
    UserAvatarLoaded,
    /// Fired before a created entity starts tearing down.
    PreTeardown,
    LoadRequestStateChanged(LoadRequestInfo),
    LoadFailed(LoadRequestInfo),
    LoadingStateChanged(LoadingState),
    RenderableCreated {
        renderable: RenderableKey,
        primitive: PrimitiveId,
    },
}

pub type EventListener = Box<dyn FnMut(EntityId, &EntityEvent) + Send>;

/// Fan-out of entity events to registered listeners.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<EventListener>,
    emitted: usize,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(EntityId, &EntityEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, entity: EntityId, event: &EntityEvent) {
        log::debug!("[{entity}] {event:?}");
        self.emitted += 1;
        for listener in &mut self.listeners {
            listener(entity, event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Total events emitted since creation.
    #[must_use]
    pub fn emitted_count(&self) -> usize {
        self.emitted
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}
