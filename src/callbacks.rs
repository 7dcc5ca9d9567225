//! Opaque handle arena for runtime callbacks.
//!
//! The runtime reports asynchronous results (load requests, for example)
//! with an integer context value chosen at registration time. The registry
//! maps such values back to live targets. Handles are never reused, so a
//! stale handle is detected instead of resolving to a newer target.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{Result, SyncError};

/// Integer context value handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextHandle(u32);

impl ContextHandle {
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

struct Inner<T> {
    live: FxHashMap<u32, T>,
    next_id: u32,
}

/// Thread-safe map from [`ContextHandle`]s to callback targets.
pub struct CallbackRegistry<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CallbackRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                live: FxHashMap::default(),
                next_id: 0,
            }),
        }
    }

    pub fn register(&self, target: T) -> ContextHandle {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1);
        inner.live.insert(id, target);
        ContextHandle(id)
    }

    /// Removes a handle and returns its target.
    pub fn unregister(&self, handle: ContextHandle) -> Result<T> {
        let mut inner = self.inner.lock();
        if let Some(target) = inner.live.remove(&handle.0) {
            return Ok(target);
        }
        if handle.0 < inner.next_id {
            Err(SyncError::HandleAlreadyReleased(handle))
        } else {
            Err(SyncError::UnknownHandle(handle))
        }
    }

    /// Runs `f` on the target of `handle`, if it is live.
    pub fn with<R>(&self, handle: ContextHandle, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.lock().live.get(&handle.0).map(f)
    }

    #[must_use]
    pub fn contains(&self, handle: ContextHandle) -> bool {
        self.inner.lock().live.contains_key(&handle.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every live handle and returns the targets.
    pub fn dispose_all(&self) -> Vec<T> {
        let live = std::mem::take(&mut self.inner.lock().live);
        if !live.is_empty() {
            log::debug!("Disposing {} callback contexts", live.len());
        }
        live.into_values().collect()
    }
}

impl<T: Clone> CallbackRegistry<T> {
    #[must_use]
    pub fn get(&self, handle: ContextHandle) -> Option<T> {
        self.with(handle, T::clone)
    }
}

impl<T> std::fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CallbackRegistry")
            .field("live", &inner.live.len())
            .field("next_id", &inner.next_id)
            .finish()
    }
}
