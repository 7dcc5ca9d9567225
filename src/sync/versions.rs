//! Current/target version tracking for the three runtime version tokens.
//!
//! `target` is the latest token observed from the runtime; `current` is the
//! token the local mirror was last fully rebuilt against. Only a completed
//! rebuild may call [`VersionPair::commit`].

use crate::runtime::ids::{HierarchyVersion, RenderStateVersion};

/// A runtime version token.
pub trait VersionToken: Copy + Eq + std::fmt::Debug {
    const INVALID: Self;
}

impl VersionToken for HierarchyVersion {
    const INVALID: Self = HierarchyVersion::INVALID;
}

impl VersionToken for RenderStateVersion {
    const INVALID: Self = RenderStateVersion::INVALID;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPair<V: VersionToken> {
    current: V,
    target: V,
}

impl<V: VersionToken> VersionPair<V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: V::INVALID,
            target: V::INVALID,
        }
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> V {
        self.current
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> V {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.current == self.target
    }

    /// True when `observed` differs from what the mirror was built against.
    #[inline]
    #[must_use]
    pub fn is_stale(&self, observed: V) -> bool {
        self.current != observed
    }

    /// Records the latest token reported by the runtime.
    #[inline]
    pub fn observe(&mut self, observed: V) {
        self.target = observed;
    }

    /// Marks the mirror as rebuilt against `version`.
    #[inline]
    pub fn commit(&mut self, version: V) {
        self.current = version;
        if self.target == V::INVALID {
            self.target = version;
        }
    }

    pub fn invalidate(&mut self) {
        self.current = V::INVALID;
        self.target = V::INVALID;
    }
}

impl<V: VersionToken> Default for VersionPair<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three version pairs of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionedStateCache {
    pub hierarchy: VersionPair<HierarchyVersion>,
    pub all_nodes: VersionPair<RenderStateVersion>,
    pub visible_nodes: VersionPair<RenderStateVersion>,
}

impl VersionedStateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.hierarchy.is_synced() && self.all_nodes.is_synced() && self.visible_nodes.is_synced()
    }

    /// Returns every pair to the invalid sentinel.
    pub fn invalidate(&mut self) {
        self.hierarchy.invalidate();
        self.all_nodes.invalidate();
        self.visible_nodes.invalidate();
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_then_commit() {
        let mut pair = VersionPair::<HierarchyVersion>::new();
        pair.observe(HierarchyVersion(3));
        assert!(!pair.is_synced());
        assert!(pair.is_stale(HierarchyVersion(3)));

        pair.commit(HierarchyVersion(3));
        assert!(pair.is_synced());
        assert!(!pair.is_stale(HierarchyVersion(3)));
    }

    #[test]
    fn invalidate_resets_everything() {
        let mut cache = VersionedStateCache::new();
        cache.hierarchy.commit(HierarchyVersion(1));
        cache.visible_nodes.commit(RenderStateVersion(4));
        assert!(!cache.is_invalid());

        cache.invalidate();
        assert!(cache.is_invalid());
        assert_eq!(cache.hierarchy.current(), HierarchyVersion::INVALID);
    }
}
