//! Mesh node to renderable bindings, visibility and LOD cost booking.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::runtime::ids::{LodFlags, NodeId, PrimitiveId, RenderInstanceId};
use crate::runtime::pose::RenderState;
use crate::scene::{RenderableKey, SceneGraph};
use crate::sync::lod::{LodBuckets, LodCost};

/// One renderable placed for a primitive on a mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveRenderData {
    pub mesh_node_id: NodeId,
    pub primitive_id: PrimitiveId,
    pub instance_id: RenderInstanceId,
    pub renderable: RenderableKey,
    pub lod_flags: LodFlags,
    pub cost: LodCost,
}

/// Renderables bound to one mesh node. Usually one, sometimes a few.
pub type NodeRenderables = SmallVec<[PrimitiveRenderData; 2]>;

/// Outcome of a visibility walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityReport {
    pub shown: usize,
    pub hidden: usize,
    /// Visible nodes with no renderables bound.
    pub missing: Vec<NodeId>,
    /// Visible nodes the walk never reached because the visible list was not
    /// an ordered subsequence of the all-nodes list.
    pub unmatched: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct RenderableRegistry {
    mesh_nodes: FxHashMap<NodeId, NodeRenderables>,
    by_instance: FxHashMap<RenderInstanceId, RenderableKey>,
    visible_nodes: Vec<NodeId>,
    lods: LodBuckets,
}

impl RenderableRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `node` already has a renderable for `primitive`.
    #[must_use]
    pub fn has_primitive(&self, node: NodeId, primitive: PrimitiveId) -> bool {
        self.mesh_nodes
            .get(&node)
            .is_some_and(|datas| datas.iter().any(|d| d.primitive_id == primitive))
    }

    pub fn insert(&mut self, data: PrimitiveRenderData) {
        self.by_instance.insert(data.instance_id, data.renderable);
        self.mesh_nodes
            .entry(data.mesh_node_id)
            .or_default()
            .push(data);
    }

    #[must_use]
    pub fn node_renderables(&self, node: NodeId) -> Option<&[PrimitiveRenderData]> {
        self.mesh_nodes.get(&node).map(SmallVec::as_slice)
    }

    #[must_use]
    pub fn renderable_for_instance(&self, instance: RenderInstanceId) -> Option<RenderableKey> {
        self.by_instance.get(&instance).copied()
    }

    #[must_use]
    pub fn mesh_node_count(&self) -> usize {
        self.mesh_nodes.len()
    }

    #[must_use]
    pub fn renderable_count(&self) -> usize {
        self.mesh_nodes.values().map(SmallVec::len).sum()
    }

    /// Visible mesh nodes with renderables, in visible-list order.
    #[must_use]
    pub fn visible_nodes(&self) -> &[NodeId] {
        &self.visible_nodes
    }

    pub fn visible_renderables(&self) -> impl Iterator<Item = &PrimitiveRenderData> + '_ {
        self.visible_nodes
            .iter()
            .filter_map(|n| self.mesh_nodes.get(n))
            .flat_map(|datas| datas.iter())
    }

    pub fn all_renderables(&self) -> impl Iterator<Item = &PrimitiveRenderData> + '_ {
        self.mesh_nodes.values().flat_map(|datas| datas.iter())
    }

    #[must_use]
    pub fn lods(&self) -> &LodBuckets {
        &self.lods
    }

    pub fn lods_mut(&mut self) -> &mut LodBuckets {
        &mut self.lods
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    /// Applies the visible-node list of `state`.
    ///
    /// Walks the all-nodes list once with a cursor into the visible list;
    /// a node is visible when it equals the node under the cursor. Every
    /// renderable whose visibility flips has its cost booked in or out of
    /// its LOD bucket. Afterwards the populated LOD range is refreshed.
    pub fn update_visibility(&mut self, state: &RenderState, scene: &mut SceneGraph) -> VisibilityReport {
        let mut report = VisibilityReport::default();
        let visible = &state.visible_mesh_nodes;
        let mut cursor = 0usize;

        self.visible_nodes.clear();

        for &node in &state.all_mesh_nodes {
            let is_visible = visible.get(cursor) == Some(&node);

            if let Some(datas) = self.mesh_nodes.get(&node) {
                for data in datas {
                    let Some(renderable) = scene.renderable_mut(data.renderable) else {
                        continue;
                    };
                    if renderable.visible == is_visible {
                        continue;
                    }
                    renderable.visible = is_visible;
                    if is_visible {
                        self.lods.add_visible_cost(data.renderable, data.lod_flags, data.cost);
                        report.shown += 1;
                    } else {
                        self.lods.remove_visible_cost(data.renderable, data.lod_flags, data.cost);
                        report.hidden += 1;
                    }
                }
            }

            if is_visible {
                cursor += 1;
                if self.mesh_nodes.contains_key(&node) {
                    self.visible_nodes.push(node);
                } else {
                    log::error!("Missing visible meshNode with id {node}");
                    report.missing.push(node);
                }
            }
        }

        if cursor < visible.len() {
            report.unmatched.extend_from_slice(&visible[cursor..]);
            log::warn!(
                "{} visible mesh nodes are not an ordered subsequence of all mesh nodes",
                report.unmatched.len()
            );
        }

        self.lods.refresh_range();
        report
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Removes every mesh node absent from `all_nodes`. Returns the removed ids.
    pub fn remove_stale_nodes(&mut self, all_nodes: &[NodeId], scene: &mut SceneGraph) -> Vec<NodeId> {
        if self.mesh_nodes.is_empty() {
            return Vec::new();
        }
        let keep: FxHashSet<NodeId> = all_nodes.iter().copied().collect();
        let stale: Vec<NodeId> = self
            .mesh_nodes
            .keys()
            .filter(|n| !keep.contains(n))
            .copied()
            .collect();
        for &node in &stale {
            self.remove_node(node, scene);
        }
        stale
    }

    /// Destroys all renderables of a mesh node, unbooking visible cost.
    pub fn remove_node(&mut self, node: NodeId, scene: &mut SceneGraph) -> bool {
        let Some(datas) = self.mesh_nodes.remove(&node) else {
            return false;
        };
        for data in &datas {
            if scene.renderable(data.renderable).is_some_and(|r| r.visible) {
                let removed = self.lods.remove_visible_cost(data.renderable, data.lod_flags, data.cost);
                debug_assert!(removed || data.lod_flags.is_empty());
            }
            self.by_instance.remove(&data.instance_id);
            scene.destroy_renderable(data.renderable);
        }
        self.visible_nodes.retain(|n| *n != node);
        true
    }

    /// Destroys every renderable and LOD container.
    pub fn destroy_all(&mut self, scene: &mut SceneGraph) {
        let nodes: Vec<NodeId> = self.mesh_nodes.keys().copied().collect();
        for node in nodes {
            self.remove_node(node, scene);
        }
        self.by_instance.clear();
        self.visible_nodes.clear();
        self.lods.destroy(scene);
    }
}
