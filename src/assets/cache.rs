use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::primitive::{AssetStatus, PrimitiveAsset};
use crate::runtime::ids::PrimitiveId;

pub struct CacheEntry {
    pub asset: Arc<PrimitiveAsset>,
    pub status: AssetStatus,
}

/// Thread-safe primitive cache shared by all entities.
///
/// Loaders on other threads insert assets as `Loading` and flip them to
/// `Loaded` or `Cancelled`; the sync loop only reads.
#[derive(Default)]
pub struct PrimitiveCache {
    inner: RwLock<FxHashMap<PrimitiveId, CacheEntry>>,
}

impl PrimitiveCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// [Write] Inserts or replaces a primitive.
    pub fn insert(&self, asset: PrimitiveAsset, status: AssetStatus) -> Arc<PrimitiveAsset> {
        let asset = Arc::new(asset);
        let mut guard = self.inner.write();
        guard.insert(
            asset.id,
            CacheEntry {
                asset: Arc::clone(&asset),
                status,
            },
        );
        asset
    }

    /// [Write] Updates the status of a known primitive. Returns false if absent.
    pub fn set_status(&self, id: PrimitiveId, status: AssetStatus) -> bool {
        let mut guard = self.inner.write();
        match guard.get_mut(&id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn mark_loaded(&self, id: PrimitiveId) -> bool {
        self.set_status(id, AssetStatus::Loaded)
    }

    pub fn cancel(&self, id: PrimitiveId) -> bool {
        self.set_status(id, AssetStatus::Cancelled)
    }

    pub fn remove(&self, id: PrimitiveId) -> Option<Arc<PrimitiveAsset>> {
        self.inner.write().remove(&id).map(|e| e.asset)
    }

    /// [Read] Resolves a primitive and its current status.
    pub fn resolve(&self, id: PrimitiveId) -> Option<(Arc<PrimitiveAsset>, AssetStatus)> {
        let guard = self.inner.read();
        guard.get(&id).map(|e| (Arc::clone(&e.asset), e.status))
    }

    pub fn status(&self, id: PrimitiveId) -> Option<AssetStatus> {
        self.inner.read().get(&id).map(|e| e.status)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// [Read - Advanced] Acquires a read-lock guard for batch access.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, FxHashMap<PrimitiveId, CacheEntry>> {
        self.inner.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        let cache = PrimitiveCache::new();
        cache.insert(PrimitiveAsset::new(PrimitiveId(4), "body"), AssetStatus::Loading);
        assert_eq!(cache.status(PrimitiveId(4)), Some(AssetStatus::Loading));

        assert!(cache.mark_loaded(PrimitiveId(4)));
        let (asset, status) = cache.resolve(PrimitiveId(4)).unwrap();
        assert_eq!(asset.name, "body");
        assert_eq!(status, AssetStatus::Loaded);

        assert!(!cache.cancel(PrimitiveId(5)));
        assert!(cache.resolve(PrimitiveId(5)).is_none());
    }
}
