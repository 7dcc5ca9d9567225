//! Primitive assets and the shared primitive cache.

pub mod cache;
pub mod primitive;

pub use cache::{CacheEntry, PrimitiveCache};
pub use primitive::{AssetStatus, MaterialHandle, MeshHandle, PrimitiveAsset};
