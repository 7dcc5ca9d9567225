use glam::Affine3A;

use crate::scene::transform::Transform;
use crate::scene::{NodeHandle, RenderableKey};

/// A plain transform node in the mirrored hierarchy.
///
/// Nodes only carry hierarchy and transform data. Renderable components live
/// in a separate map on [`SceneGraph`](crate::scene::SceneGraph) and point back
/// at their node.
///
/// # Hierarchy
///
/// - `parent`: Optional handle to parent node (None for root nodes)
/// - `children`: List of child node handles
///
/// Both sides are kept in sync by [`SceneGraph::attach`](crate::scene::SceneGraph::attach).
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,

    // === Core Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    // === Core Spatial Data ===
    pub transform: Transform,

    // === Components ===
    pub(crate) renderable: Option<RenderableKey>,

    // === Core State ===
    pub active: bool,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            renderable: None,
            active: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn renderable(&self) -> Option<RenderableKey> {
        self.renderable
    }

    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// World matrix as of the last [`SceneGraph::update_world_matrices`](crate::scene::SceneGraph::update_world_matrices).
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new("")
    }
}
