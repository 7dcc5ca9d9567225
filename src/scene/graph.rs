use glam::Vec3;
use slotmap::SlotMap;

use crate::runtime::pose::JointTransform;
use crate::scene::node::Node;
use crate::scene::renderable::{Renderable, RenderableDesc};
use crate::scene::transform_system;
use crate::scene::{NodeHandle, RenderableKey};

/// Host-side hierarchy the entities mirror into.
///
/// Owns plain transform nodes and the renderable components attached to
/// them. Entities create and destroy nodes explicitly; nothing here is
/// reference counted.
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeHandle, Node>,
    roots: Vec<NodeHandle>,
    renderables: SlotMap<RenderableKey, Renderable>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Adds a root node.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeHandle {
        let handle = self.nodes.insert(Node::new(name));
        self.roots.push(handle);
        handle
    }

    /// Adds a node under `parent`, or as a root if the parent is gone.
    pub fn add_to_parent(&mut self, name: impl Into<String>, parent: NodeHandle) -> NodeHandle {
        let handle = self.nodes.insert(Node::new(name));
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(handle);
            self.nodes[handle].parent = Some(parent);
        } else {
            log::error!("Parent node not found, adding as root");
            self.roots.push(handle);
        }
        handle
    }

    /// Moves `child` under `parent`, detaching it from its previous parent.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent {
            log::warn!("Cannot attach node to itself!");
            return;
        }
        if !self.nodes.contains_key(parent) {
            log::error!("Parent node not found during attach!");
            return;
        }
        if self.nodes.get(child).and_then(|n| n.parent) == Some(parent) {
            return;
        }

        self.unlink(child);
        self.nodes[parent].children.push(child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.transform.mark_dirty();
        }
    }

    /// Makes `child` a root node.
    pub fn detach(&mut self, child: NodeHandle) {
        if self.nodes.get(child).is_none_or(|n| n.parent.is_none()) {
            return;
        }
        self.unlink(child);
        self.roots.push(child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
            c.transform.mark_dirty();
        }
    }

    fn unlink(&mut self, child: NodeHandle) {
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p)
                && let Some(i) = n.children.iter().position(|&x| x == child)
            {
                n.children.remove(i);
            }
        } else if let Some(i) = self.roots.iter().position(|&x| x == child) {
            self.roots.remove(i);
        }
    }

    /// Destroys a single node and its renderable component.
    ///
    /// The node is expected to be childless. Remaining children are detached
    /// to the root level and an error is logged.
    pub fn destroy_node(&mut self, handle: NodeHandle) -> bool {
        let Some(node) = self.nodes.get(handle) else {
            return false;
        };
        let children = node.children.clone();
        if !children.is_empty() {
            log::error!(
                "Destroying node '{}' with {} children still attached",
                node.name,
                children.len()
            );
            for child in children {
                self.detach(child);
            }
        }

        self.unlink(handle);
        if let Some(node) = self.nodes.remove(handle)
            && let Some(key) = node.renderable
        {
            self.renderables.remove(key);
        }
        true
    }

    /// Destroys a node and every descendant, children first.
    pub fn remove_subtree(&mut self, handle: NodeHandle) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        for child in node.children.clone() {
            self.remove_subtree(child);
        }
        self.destroy_node(handle);
    }

    #[inline]
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    #[inline]
    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeHandle] {
        &self.roots
    }

    /// Writes a runtime joint transform into a node's local TRS.
    pub fn set_local_transform(&mut self, handle: NodeHandle, joint: &JointTransform) -> bool {
        match self.nodes.get_mut(handle) {
            Some(node) => {
                node.transform.apply_joint(joint);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn local_transform(&self, handle: NodeHandle) -> Option<JointTransform> {
        self.nodes.get(handle).map(|n| n.transform.to_joint())
    }

    #[must_use]
    pub fn world_position(&self, handle: NodeHandle) -> Option<Vec3> {
        self.nodes
            .get(handle)
            .map(|n| Vec3::from(n.transform.world_matrix.translation))
    }

    pub fn update_world_matrices(&mut self) {
        transform_system::update_hierarchy(&mut self.nodes, &self.roots);
    }

    pub fn update_subtree(&mut self, root: NodeHandle) {
        transform_system::update_subtree(&mut self.nodes, root);
    }

    // ========================================================================
    // Renderables
    // ========================================================================

    /// Creates a node named after the primitive under `parent` and attaches a
    /// renderable component to it.
    pub fn create_renderable(&mut self, desc: RenderableDesc, parent: NodeHandle) -> RenderableKey {
        let node = self.add_to_parent(desc.name.clone(), parent);
        let key = self.renderables.insert(Renderable::from_desc(node, desc));
        self.nodes[node].renderable = Some(key);
        key
    }

    /// Destroys a renderable and the node carrying it.
    pub fn destroy_renderable(&mut self, key: RenderableKey) -> bool {
        match self.renderables.get(key) {
            Some(r) => {
                let node = r.node;
                self.destroy_node(node);
                self.renderables.remove(key);
                true
            }
            None => false,
        }
    }

    #[inline]
    #[must_use]
    pub fn renderable(&self, key: RenderableKey) -> Option<&Renderable> {
        self.renderables.get(key)
    }

    #[inline]
    pub fn renderable_mut(&mut self, key: RenderableKey) -> Option<&mut Renderable> {
        self.renderables.get_mut(key)
    }

    #[must_use]
    pub fn renderable_count(&self) -> usize {
        self.renderables.len()
    }

    pub fn renderables(&self) -> impl Iterator<Item = (RenderableKey, &Renderable)> {
        self.renderables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_moves_between_parents() {
        let mut g = SceneGraph::new();
        let a = g.add_node("a");
        let b = g.add_node("b");
        let c = g.add_to_parent("c", a);

        g.attach(c, b);
        assert!(g.node(a).unwrap().children().is_empty());
        assert_eq!(g.node(b).unwrap().children(), &[c]);
        assert_eq!(g.node(c).unwrap().parent(), Some(b));
        assert_eq!(g.roots(), &[a, b]);
    }

    #[test]
    fn destroy_node_with_children_detaches_them() {
        let mut g = SceneGraph::new();
        let a = g.add_node("a");
        let b = g.add_to_parent("b", a);

        assert!(g.destroy_node(a));
        assert!(g.contains(b));
        assert_eq!(g.node(b).unwrap().parent(), None);
        assert_eq!(g.roots(), &[b]);
    }

    #[test]
    fn remove_subtree_clears_everything() {
        let mut g = SceneGraph::new();
        let a = g.add_node("a");
        let b = g.add_to_parent("b", a);
        g.add_to_parent("c", b);

        g.remove_subtree(a);
        assert_eq!(g.node_count(), 0);
        assert!(g.roots().is_empty());
    }
}
