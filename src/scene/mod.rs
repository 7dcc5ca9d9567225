//! Mirrored scene hierarchy.
//!
//! - [`Node`]: transform node with parent/children links
//! - [`Transform`]: local TRS with cached matrices and dirty checking
//! - [`Renderable`]: mesh + material instance attached to a node
//! - [`SceneGraph`]: owner of all nodes and renderables
//! - [`transform_system`]: world matrix propagation

pub mod graph;
pub mod node;
pub mod renderable;
pub mod transform;
pub mod transform_system;

pub use graph::SceneGraph;
pub use node::Node;
pub use renderable::{Renderable, RenderableDesc, SkinBinding};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct RenderableKey;
}
