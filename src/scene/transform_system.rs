//! World matrix propagation for the [`SceneGraph`](crate::scene::SceneGraph).
//!
//! Borrows only the node map and root list so it can run while other parts of
//! the graph are borrowed.

use glam::Affine3A;
use slotmap::SlotMap;

use crate::scene::NodeHandle;
use crate::scene::node::Node;

/// Updates world matrices below every root, depth first, with an explicit
/// stack. A subtree is only recomposed when its own local matrix or an
/// ancestor's world matrix changed.
pub fn update_hierarchy(nodes: &mut SlotMap<NodeHandle, Node>, roots: &[NodeHandle]) {
    let mut stack: Vec<(NodeHandle, Affine3A, bool)> = Vec::with_capacity(64);

    for &root in roots.iter().rev() {
        stack.push((root, Affine3A::IDENTITY, false));
    }

    while let Some((handle, parent_world, parent_changed)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };

        let local_changed = node.transform.update_local_matrix();
        let world_changed = local_changed || parent_changed;

        if world_changed {
            let world = parent_world * *node.transform.local_matrix();
            node.transform.set_world_matrix(world);
        }

        let world = node.transform.world_matrix;
        for &child in node.children.iter().rev() {
            stack.push((child, world, world_changed));
        }
    }
}

/// Recomposes the subtree under `root` from its parent's current world matrix.
pub fn update_subtree(nodes: &mut SlotMap<NodeHandle, Node>, root: NodeHandle) {
    let parent_world = match nodes.get(root).and_then(|n| n.parent) {
        Some(parent) => nodes
            .get(parent)
            .map_or(Affine3A::IDENTITY, |p| p.transform.world_matrix),
        None => Affine3A::IDENTITY,
    };

    let mut stack = vec![(root, parent_world)];
    while let Some((handle, parent_world)) = stack.pop() {
        let Some(node) = nodes.get_mut(handle) else {
            continue;
        };
        node.transform.update_local_matrix();
        let world = parent_world * *node.transform.local_matrix();
        node.transform.set_world_matrix(world);
        for &child in node.children.iter().rev() {
            stack.push((child, world));
        }
    }
}
