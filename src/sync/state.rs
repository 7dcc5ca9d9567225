//! Explicit lifecycle state machine of an avatar entity.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SyncError};

/// How far an entity has progressed through loading.
///
/// Advances monotonically; the only backwards move is teardown to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AvatarState {
    /// No runtime entity exists.
    None,
    /// Runtime entity created, nothing loaded.
    Created,
    /// A skeleton is mirrored.
    Skeleton,
    /// The default model is loaded.
    DefaultAvatar,
    /// A reduced fast-load version of the user avatar is loaded.
    FastLoad,
    /// The full user avatar is loaded.
    UserAvatar,
}

impl AvatarState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: AvatarState) -> bool {
        use AvatarState::{Created, DefaultAvatar, FastLoad, None, Skeleton, UserAvatar};
        matches!(
            (self, next),
            (_, None)
                | (None, Created)
                | (Created, Skeleton)
                | (Skeleton, DefaultAvatar | FastLoad | UserAvatar)
                | (DefaultAvatar, FastLoad | UserAvatar)
                | (FastLoad, UserAvatar)
        )
    }

    /// Validates and performs a transition.
    pub fn transition(&mut self, next: AvatarState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(SyncError::InvalidStateTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn has_skeleton(self) -> bool {
        self >= AvatarState::Skeleton
    }
}

impl Default for AvatarState {
    fn default() -> Self {
        Self::None
    }
}

/// Outcome-oriented load status reported to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingState {
    Failed,
    NotCreated,
    Created,
    Loading,
    Success,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self::NotCreated
    }
}
