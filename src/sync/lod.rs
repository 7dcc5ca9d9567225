//! Level-of-detail buckets and visible cost accounting.
//!
//! Every visible renderable contributes its [`LodCost`] to exactly one bucket:
//! the all-LOD bucket when its flags are [`LodFlags::ALL`], otherwise the
//! bucket of its highest quality level. Totals are maintained incrementally.

use std::ops::{Add, AddAssign, Sub, SubAssign};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SyncError};
use crate::runtime::ids::{LOD_COUNT, LodFlags, PrimitiveId};
use crate::scene::{NodeHandle, RenderableKey, SceneGraph};

/// Vertex and triangle cost of a renderable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LodCost {
    pub mesh_vertex_count: u32,
    pub morph_vertex_count: u32,
    pub triangle_count: u32,
}

impl LodCost {
    pub const ZERO: Self = Self {
        mesh_vertex_count: 0,
        morph_vertex_count: 0,
        triangle_count: 0,
    };

    #[must_use]
    pub const fn new(mesh_vertex_count: u32, morph_vertex_count: u32, triangle_count: u32) -> Self {
        Self {
            mesh_vertex_count,
            morph_vertex_count,
            triangle_count,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for LodCost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        debug_assert!(
            self.mesh_vertex_count.checked_add(rhs.mesh_vertex_count).is_some()
                && self.morph_vertex_count.checked_add(rhs.morph_vertex_count).is_some()
                && self.triangle_count.checked_add(rhs.triangle_count).is_some(),
            "LOD cost overflow"
        );
        Self {
            mesh_vertex_count: self.mesh_vertex_count.saturating_add(rhs.mesh_vertex_count),
            morph_vertex_count: self.morph_vertex_count.saturating_add(rhs.morph_vertex_count),
            triangle_count: self.triangle_count.saturating_add(rhs.triangle_count),
        }
    }
}

impl AddAssign for LodCost {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for LodCost {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        debug_assert!(
            self.mesh_vertex_count >= rhs.mesh_vertex_count
                && self.morph_vertex_count >= rhs.morph_vertex_count
                && self.triangle_count >= rhs.triangle_count,
            "LOD cost underflow"
        );
        Self {
            mesh_vertex_count: self.mesh_vertex_count.saturating_sub(rhs.mesh_vertex_count),
            morph_vertex_count: self.morph_vertex_count.saturating_sub(rhs.morph_vertex_count),
            triangle_count: self.triangle_count.saturating_sub(rhs.triangle_count),
        }
    }
}

impl SubAssign for LodCost {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for LodCost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

// ============================================================================
// Bucket
// ============================================================================

/// Set of visible renderables sharing one LOD slot, with their summed cost.
#[derive(Debug, Default)]
pub struct LodBucket {
    instances: FxHashSet<RenderableKey>,
    total_cost: LodCost,
}

impl LodBucket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance. Returns false (and leaves the total alone) if it was
    /// already a member.
    pub fn add_instance(&mut self, key: RenderableKey, cost: LodCost) -> bool {
        if !self.instances.insert(key) {
            return false;
        }
        self.total_cost += cost;
        true
    }

    /// Removes an instance. Returns false if it was not a member.
    pub fn remove_instance(&mut self, key: RenderableKey, cost: LodCost) -> bool {
        if !self.instances.remove(&key) {
            return false;
        }
        self.total_cost -= cost;
        true
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: RenderableKey) -> bool {
        self.instances.contains(&key)
    }

    #[inline]
    #[must_use]
    pub fn has_instances(&self) -> bool {
        !self.instances.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    #[must_use]
    pub fn total_cost(&self) -> LodCost {
        self.total_cost
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.total_cost = LodCost::ZERO;
    }
}

// ============================================================================
// Entity LOD state
// ============================================================================

/// Slot a primitive's cost is booked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodSlot {
    All,
    Level(usize),
}

impl LodSlot {
    /// Cost bucket for a set of LOD flags; `None` for an empty set.
    #[must_use]
    pub fn for_cost(flags: LodFlags) -> Option<Self> {
        if flags == LodFlags::ALL {
            Some(Self::All)
        } else {
            flags.highest_quality_index().map(Self::Level)
        }
    }
}

/// Per-entity LOD buckets, their scene containers and the populated range.
#[derive(Debug)]
pub struct LodBuckets {
    levels: [LodBucket; LOD_COUNT],
    all: LodBucket,
    level_containers: [Option<NodeHandle>; LOD_COUNT],
    all_container: Option<NodeHandle>,
    container_count: usize,
    lowest_quality: i32,
    highest_quality: i32,
}

impl Default for LodBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl LodBuckets {
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: Default::default(),
            all: LodBucket::new(),
            level_containers: [None; LOD_COUNT],
            all_container: None,
            container_count: 0,
            lowest_quality: -1,
            highest_quality: -1,
        }
    }

    /// Container node a primitive with `flags` is parented under, created
    /// lazily below `base`. Empty flags parent directly to `base`.
    pub fn container_for(
        &mut self,
        primitive: PrimitiveId,
        flags: LodFlags,
        scene: &mut SceneGraph,
        base: NodeHandle,
    ) -> Result<NodeHandle> {
        if flags.is_empty() {
            return Ok(base);
        }
        if flags == LodFlags::ALL {
            if let Some(h) = self.all_container {
                return Ok(h);
            }
            let h = scene.add_to_parent("AllLOD", base);
            self.all_container = Some(h);
            self.container_count += 1;
            return Ok(h);
        }
        let Some(level) = flags.single_level() else {
            return Err(SyncError::MultiLodPrimitive { primitive, flags });
        };
        if let Some(h) = self.level_containers[level] {
            return Ok(h);
        }
        let h = scene.add_to_parent(format!("LOD{level}"), base);
        self.level_containers[level] = Some(h);
        self.container_count += 1;
        Ok(h)
    }

    fn bucket_mut(&mut self, slot: LodSlot) -> &mut LodBucket {
        match slot {
            LodSlot::All => &mut self.all,
            LodSlot::Level(i) => &mut self.levels[i],
        }
    }

    #[must_use]
    pub fn bucket(&self, slot: LodSlot) -> &LodBucket {
        match slot {
            LodSlot::All => &self.all,
            LodSlot::Level(i) => &self.levels[i],
        }
    }

    pub fn add_visible_cost(&mut self, key: RenderableKey, flags: LodFlags, cost: LodCost) -> bool {
        match LodSlot::for_cost(flags) {
            Some(slot) => self.bucket_mut(slot).add_instance(key, cost),
            None => false,
        }
    }

    pub fn remove_visible_cost(&mut self, key: RenderableKey, flags: LodFlags, cost: LodCost) -> bool {
        match LodSlot::for_cost(flags) {
            Some(slot) => self.bucket_mut(slot).remove_instance(key, cost),
            None => false,
        }
    }

    /// Recomputes the lowest/highest quality populated level from the level
    /// buckets. The all-LOD bucket does not widen the range.
    pub fn refresh_range(&mut self) {
        self.reset_range();
        for (i, bucket) in self.levels.iter().enumerate() {
            if !bucket.has_instances() {
                continue;
            }
            let i = i as i32;
            if self.lowest_quality < i {
                self.lowest_quality = i;
            }
            if self.highest_quality == -1 || self.highest_quality > i {
                self.highest_quality = i;
            }
        }
    }

    pub fn reset_range(&mut self) {
        self.lowest_quality = -1;
        self.highest_quality = -1;
    }

    /// Highest numbered (lowest quality) populated level, or -1.
    #[must_use]
    pub fn lowest_quality_index(&self) -> i32 {
        self.lowest_quality
    }

    /// Lowest numbered (highest quality) populated level, or -1.
    #[must_use]
    pub fn highest_quality_index(&self) -> i32 {
        self.highest_quality
    }

    /// Visible cost for each level, including the all-LOD bucket.
    #[must_use]
    pub fn visible_costs(&self) -> [LodCost; LOD_COUNT] {
        let all = self.all.total_cost();
        std::array::from_fn(|i| self.levels[i].total_cost() + all)
    }

    #[must_use]
    pub fn container_count(&self) -> usize {
        self.container_count
    }

    #[must_use]
    pub fn total_instance_count(&self) -> usize {
        self.all.instance_count() + self.levels.iter().map(LodBucket::instance_count).sum::<usize>()
    }

    /// Clears all buckets and destroys the container nodes.
    pub fn destroy(&mut self, scene: &mut SceneGraph) {
        for bucket in &mut self.levels {
            bucket.clear();
        }
        self.all.clear();

        let containers = self
            .level_containers
            .iter_mut()
            .chain(std::iter::once(&mut self.all_container));
        for slot in containers {
            if let Some(h) = slot.take() {
                scene.destroy_node(h);
                self.container_count -= 1;
            }
        }
        debug_assert_eq!(self.container_count, 0);
        self.reset_range();
    }
}
