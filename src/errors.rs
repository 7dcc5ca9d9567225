//! Error Types
//!
//! This module defines the error type used throughout the crate.
//!
//! # Overview
//!
//! [`SyncError`] covers the failure modes of the synchronization engine:
//! - Runtime queries that could not be answered this tick
//! - Primitive asset resolution failures
//! - Skeleton mapping failures while building a renderable
//! - Illegal lifecycle transitions
//! - Callback registry misuse (unknown or already released handles)
//! - Configuration loading
//!
//! Most of these never cross the per-frame sync boundary: the entity absorbs
//! them at the smallest scope, logs them and retries on a later tick. They are
//! surfaced as `Result`s from the lower-level building blocks so each one can
//! be tested in isolation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use avatar_sync::errors::{Result, SyncError};
//!
//! fn rebuild() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::callbacks::ContextHandle;
use crate::runtime::ids::{EntityId, LodFlags, NodeId, PrimitiveId};
use crate::sync::state::AvatarState;

/// The main error type for the avatar synchronization engine.
#[derive(Error, Debug)]
pub enum SyncError {
    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// A runtime query returned no data this tick.
    #[error("Runtime query `{query}` failed for entity {entity}")]
    QueryFailed {
        /// Name of the query that failed
        query: &'static str,
        /// Entity the query was issued for
        entity: EntityId,
    },

    /// A runtime call returned an error status.
    #[error("Runtime call `{call}` failed: {reason}")]
    RuntimeCall {
        /// Name of the runtime call
        call: &'static str,
        /// Reason reported by the runtime
        reason: String,
    },

    /// The operation requires a created entity.
    #[error("Entity has not been created")]
    EntityNotCreated,

    /// `create` was called on an entity that is already live.
    #[error("Entity {0} is already created")]
    EntityAlreadyCreated(EntityId),

    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// No asset is registered for the primitive id.
    #[error("Primitive asset {0} not found")]
    AssetMissing(PrimitiveId),

    /// The primitive asset load was cancelled.
    #[error("Primitive asset {0} load was cancelled")]
    AssetCancelled(PrimitiveId),

    // ========================================================================
    // Build Errors
    // ========================================================================
    /// A primitive references a joint the entity skeleton does not contain.
    #[error("Primitive {primitive} joint {joint} (node {node}) is not part of the entity skeleton")]
    JointMappingFailed {
        /// Primitive whose skin could not be bound
        primitive: PrimitiveId,
        /// Primitive-local joint index
        joint: usize,
        /// Node id the joint resolved to
        node: NodeId,
    },

    /// A primitive covers more than one LOD level.
    #[error("Multi LOD primitives are not currently supported (primitive {primitive}, flags {flags:?})")]
    MultiLodPrimitive {
        /// Offending primitive
        primitive: PrimitiveId,
        /// Its LOD flags
        flags: LodFlags,
    },

    /// The primitive render state carried an invalid mesh node id.
    #[error("Primitive {0} has an invalid mesh node id")]
    InvalidMeshNode(PrimitiveId),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Attempted lifecycle transition is not legal.
    #[error("Illegal avatar state transition {from:?} -> {to:?}")]
    InvalidStateTransition {
        /// Current state
        from: AvatarState,
        /// Requested state
        to: AvatarState,
    },

    // ========================================================================
    // Callback Registry Errors
    // ========================================================================
    /// The handle was never issued by this registry.
    #[error("Unknown callback context handle {0:?}")]
    UnknownHandle(ContextHandle),

    /// The handle was issued but has already been released.
    #[error("Callback context handle {0:?} was already released")]
    HandleAlreadyReleased(ContextHandle),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;
