//! Quadtree over the world, stored as an index-based arena.
//!
//! # Invariants
//! - A cell's region is the union of its children's pairwise-disjoint
//!   regions; leaves exactly tile the root.
//! - Tree depth is uniform: every leaf's side equals the minimal leaf size.
//! - The tree shape is fixed at construction; only leaf data and the
//!   `active` flags change at streaming cadence.
//! - A leaf returns each borrowed matrix to its pool exactly once.

use tilespace_common::Region;

use crate::pool::{MatrixHandle, MatrixPool};

/// Stable identity of a cell: its arena index. Assigned at construction,
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Integer data kinds stored per leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntField {
    Collision,
    Ladder,
}

/// Float data kinds stored per leaf (the flow vector field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatField {
    VectorX,
    VectorY,
}

/// Errors raised while building the tree from a world configuration.
#[derive(Debug, thiserror::Error)]
pub enum WorldBuildError {
    #[error("world dimensions must be positive, got {width}x{height}")]
    InvalidWorldSize { width: i32, height: i32 },
    #[error("minimal leaf size must be positive, got {0}")]
    InvalidLeafSize(i32),
    #[error("tree shape mismatch: leaf at {region} has side != leaf size {leaf_size}")]
    NonUniformLeaf { region: Region, leaf_size: i32 },
}

#[derive(Debug, Default)]
struct LeafData {
    active: bool,
    collision: Option<MatrixHandle>,
    ladder: Option<MatrixHandle>,
    vector_x: Option<MatrixHandle>,
    vector_y: Option<MatrixHandle>,
}

impl LeafData {
    fn int_slot(&mut self, field: IntField) -> &mut Option<MatrixHandle> {
        match field {
            IntField::Collision => &mut self.collision,
            IntField::Ladder => &mut self.ladder,
        }
    }

    fn int_handle(&self, field: IntField) -> Option<MatrixHandle> {
        match field {
            IntField::Collision => self.collision,
            IntField::Ladder => self.ladder,
        }
    }

    fn float_handle(&self, field: FloatField) -> Option<MatrixHandle> {
        match field {
            FloatField::VectorX => self.vector_x,
            FloatField::VectorY => self.vector_y,
        }
    }
}

#[derive(Debug)]
enum CellKind {
    /// Quadrants: 0=top-left, 1=top-right, 2=bottom-left, 3=bottom-right.
    /// `index % 2` selects the x half, `index / 2` the y half.
    Internal { children: [CellId; 4] },
    Leaf(LeafData),
}

#[derive(Debug)]
struct Cell {
    region: Region,
    kind: CellKind,
}

/// The quadtree arena. Owns every cell plus the matrix pools its leaves
/// borrow from, so descend-and-borrow operations are self-contained.
#[derive(Debug)]
pub struct CellTree {
    nodes: Vec<Cell>,
    root: CellId,
    leaf_size: i32,
    int_pool: MatrixPool<i32>,
    float_pool: MatrixPool<f32>,
}

impl CellTree {
    /// Build the fixed tree shape for a world of the given dimensions.
    ///
    /// The tree side is the smallest power-of-two multiple of `leaf_size`
    /// covering both dimensions; the root is centered on the origin.
    /// Subdivision stops at `leaf_size`, and a node subdivides only if
    /// its own x, y, width, and height are all multiples of `leaf_size`.
    pub fn new(
        world_width: i32,
        world_height: i32,
        leaf_size: i32,
        int_capacity: usize,
        float_capacity: usize,
    ) -> Result<Self, WorldBuildError> {
        if world_width <= 0 || world_height <= 0 {
            return Err(WorldBuildError::InvalidWorldSize {
                width: world_width,
                height: world_height,
            });
        }
        if leaf_size <= 0 {
            return Err(WorldBuildError::InvalidLeafSize(leaf_size));
        }

        let mut side = leaf_size;
        while side < world_width.max(world_height) {
            side *= 2;
        }
        let half = side / 2;
        let root_region = Region::new(-half, -half, side - half, side - half);

        let mut nodes = Vec::new();
        let root = Self::build(&mut nodes, root_region, leaf_size);

        // Uniform-depth consistency check: a leaf wider than the minimal
        // size means the divisibility rule forced an early stop, which the
        // streaming policy cannot handle.
        if side > leaf_size {
            for cell in &nodes {
                if let CellKind::Leaf(_) = cell.kind {
                    if cell.region.width() != leaf_size || cell.region.height() != leaf_size {
                        return Err(WorldBuildError::NonUniformLeaf {
                            region: cell.region,
                            leaf_size,
                        });
                    }
                }
            }
        }

        Ok(Self {
            nodes,
            root,
            leaf_size,
            int_pool: MatrixPool::new(leaf_size as usize, int_capacity),
            float_pool: MatrixPool::new(leaf_size as usize, float_capacity),
        })
    }

    /// Children are built before the parent, so child ids are always
    /// smaller than their parent's.
    fn build(nodes: &mut Vec<Cell>, region: Region, leaf_size: i32) -> CellId {
        let divisible = region.width() > leaf_size
            && region.min_x % leaf_size == 0
            && region.min_y % leaf_size == 0
            && region.width() % leaf_size == 0
            && region.height() % leaf_size == 0;

        let kind = if divisible {
            let half_w = region.width() / 2;
            let half_h = region.height() / 2;
            let mut children = [CellId(0); 4];
            for (index, child) in children.iter_mut().enumerate() {
                let dx = (index % 2) as i32;
                let dy = (index / 2) as i32;
                let child_region = Region::from_origin_size(
                    region.min_x + dx * half_w,
                    region.min_y + dy * half_h,
                    half_w,
                    half_h,
                );
                *child = Self::build(nodes, child_region, leaf_size);
            }
            CellKind::Internal { children }
        } else {
            CellKind::Leaf(LeafData::default())
        };

        nodes.push(Cell { region, kind });
        CellId((nodes.len() - 1) as u32)
    }

    pub fn root(&self) -> CellId {
        self.root
    }

    pub fn leaf_size(&self) -> i32 {
        self.leaf_size
    }

    pub fn region(&self, id: CellId) -> Region {
        self.nodes[id.index()].region
    }

    pub fn has_children(&self, id: CellId) -> bool {
        matches!(self.nodes[id.index()].kind, CellKind::Internal { .. })
    }

    pub fn children(&self, id: CellId) -> Option<[CellId; 4]> {
        match self.nodes[id.index()].kind {
            CellKind::Internal { children } => Some(children),
            CellKind::Leaf(_) => None,
        }
    }

    /// Whether this leaf currently owns live data. Always false for
    /// internal nodes.
    pub fn is_active(&self, id: CellId) -> bool {
        match &self.nodes[id.index()].kind {
            CellKind::Leaf(leaf) => leaf.active,
            CellKind::Internal { .. } => false,
        }
    }

    /// Point-in-region test against this cell's own half-open region.
    pub fn contains(&self, id: CellId, x: i32, y: i32) -> bool {
        self.nodes[id.index()].region.contains(x, y)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|c| matches!(c.kind, CellKind::Leaf(_)))
            .count()
    }

    pub fn active_leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|c| matches!(&c.kind, CellKind::Leaf(leaf) if leaf.active))
            .count()
    }

    pub fn int_matrices_taken(&self) -> usize {
        self.int_pool.taken()
    }

    pub fn float_matrices_taken(&self) -> usize {
        self.float_pool.taken()
    }

    /// Follow the quadrant branching from `id` to the leaf containing
    /// (x,y), or None when the point is outside `id`'s region.
    fn leaf_at_from(&self, start: CellId, x: i32, y: i32) -> Option<CellId> {
        if !self.contains(start, x, y) {
            return None;
        }
        let mut id = start;
        loop {
            match &self.nodes[id.index()].kind {
                CellKind::Internal { children } => {
                    let region = self.nodes[id.index()].region;
                    let ix = if x < region.mid_x() { 0 } else { 1 };
                    let iy = if y < region.mid_y() { 0 } else { 1 };
                    id = children[iy * 2 + ix];
                }
                CellKind::Leaf(_) => return Some(id),
            }
        }
    }

    /// The leaf containing (x,y), if the point is inside the world.
    pub fn leaf_at(&self, x: i32, y: i32) -> Option<CellId> {
        self.leaf_at_from(self.root, x, y)
    }

    /// Integer data at (x,y) as seen from `id`: zero for points outside
    /// `id`'s region and for leaves that never borrowed this field's
    /// matrix, so blind recursive calls are always safe.
    pub fn int_at(&self, id: CellId, x: i32, y: i32, field: IntField) -> i32 {
        let Some(leaf_id) = self.leaf_at_from(id, x, y) else {
            return 0;
        };
        let CellKind::Leaf(leaf) = &self.nodes[leaf_id.index()].kind else {
            unreachable!("leaf_at_from returns leaves");
        };
        let Some(handle) = leaf.int_handle(field) else {
            return 0;
        };
        let region = self.nodes[leaf_id.index()].region;
        self.int_pool
            .get(handle)
            .get((x - region.min_x) as usize, (y - region.min_y) as usize)
    }

    /// Float analogue of [`Self::int_at`].
    pub fn float_at(&self, id: CellId, x: i32, y: i32, field: FloatField) -> f32 {
        let Some(leaf_id) = self.leaf_at_from(id, x, y) else {
            return 0.0;
        };
        let CellKind::Leaf(leaf) = &self.nodes[leaf_id.index()].kind else {
            unreachable!("leaf_at_from returns leaves");
        };
        let Some(handle) = leaf.float_handle(field) else {
            return 0.0;
        };
        let region = self.nodes[leaf_id.index()].region;
        self.float_pool
            .get(handle)
            .get((x - region.min_x) as usize, (y - region.min_y) as usize)
    }

    pub fn get_int(&self, x: i32, y: i32, field: IntField) -> i32 {
        self.int_at(self.root, x, y, field)
    }

    pub fn get_float(&self, x: i32, y: i32, field: FloatField) -> f32 {
        self.float_at(self.root, x, y, field)
    }

    /// Add `delta` to an integer field at (x,y), descending from `start`
    /// and lazily borrowing the leaf's matrix on first write. Points
    /// outside `start`'s region are ignored.
    fn add_int_from(&mut self, start: CellId, x: i32, y: i32, field: IntField, delta: i32) {
        let Some(leaf_id) = self.leaf_at_from(start, x, y) else {
            return;
        };
        let region = self.nodes[leaf_id.index()].region;
        let CellKind::Leaf(leaf) = &mut self.nodes[leaf_id.index()].kind else {
            unreachable!("leaf_at_from returns leaves");
        };
        let int_pool = &mut self.int_pool;
        if delta < 0 {
            // A decrement on a leaf that never borrowed this field's
            // matrix means the caller double-released its data.
            let handle = leaf.int_handle(field).unwrap_or_else(|| {
                panic!("decrement of {field:?} at ({x},{y}) on a leaf with no {field:?} data")
            });
            let matrix = int_pool.get_mut(handle);
            let lx = (x - region.min_x) as usize;
            let ly = (y - region.min_y) as usize;
            matrix.set(lx, ly, matrix.get(lx, ly) + delta);
        } else {
            let handle = *leaf.int_slot(field).get_or_insert_with(|| int_pool.borrow());
            let matrix = int_pool.get_mut(handle);
            let lx = (x - region.min_x) as usize;
            let ly = (y - region.min_y) as usize;
            matrix.set(lx, ly, matrix.get(lx, ly) + delta);
        }
    }

    pub fn increment(&mut self, x: i32, y: i32, field: IntField) {
        self.add_int_from(self.root, x, y, field, 1);
    }

    pub fn decrement(&mut self, x: i32, y: i32, field: IntField) {
        self.add_int_from(self.root, x, y, field, -1);
    }

    /// Increment restricted to one cell's subtree; used while loading a
    /// single leaf so points belonging to neighbouring leaves are left
    /// for those leaves to load.
    pub fn increment_in_cell(&mut self, id: CellId, x: i32, y: i32, field: IntField) {
        self.add_int_from(id, x, y, field, 1);
    }

    /// Apply `f` to the flow vector at (x,y), lazily borrowing both
    /// float matrices, descending from `start`. Points outside are
    /// ignored.
    fn modify_vector_field_from(
        &mut self,
        start: CellId,
        x: i32,
        y: i32,
        f: impl FnOnce(f32, f32) -> (f32, f32),
    ) {
        let Some(leaf_id) = self.leaf_at_from(start, x, y) else {
            return;
        };
        let region = self.nodes[leaf_id.index()].region;
        let CellKind::Leaf(leaf) = &mut self.nodes[leaf_id.index()].kind else {
            unreachable!("leaf_at_from returns leaves");
        };
        let float_pool = &mut self.float_pool;
        let hx = *leaf.vector_x.get_or_insert_with(|| float_pool.borrow());
        let hy = *leaf.vector_y.get_or_insert_with(|| float_pool.borrow());
        let lx = (x - region.min_x) as usize;
        let ly = (y - region.min_y) as usize;
        let (vx, vy) = f(float_pool.get(hx).get(lx, ly), float_pool.get(hy).get(lx, ly));
        float_pool.get_mut(hx).set(lx, ly, vx);
        float_pool.get_mut(hy).set(lx, ly, vy);
    }

    pub fn modify_vector_field_at(
        &mut self,
        x: i32,
        y: i32,
        f: impl FnOnce(f32, f32) -> (f32, f32),
    ) {
        self.modify_vector_field_from(self.root, x, y, f);
    }

    pub fn modify_vector_field_in_cell(
        &mut self,
        id: CellId,
        x: i32,
        y: i32,
        f: impl FnOnce(f32, f32) -> (f32, f32),
    ) {
        self.modify_vector_field_from(id, x, y, f);
    }

    /// Mark the leaf containing (x,y) active. Idempotent.
    pub fn activate(&mut self, x: i32, y: i32) {
        if let Some(leaf_id) = self.leaf_at(x, y) {
            self.activate_cell(leaf_id);
        }
    }

    /// Mark a leaf active. Idempotent; no-op on internal nodes.
    pub fn activate_cell(&mut self, id: CellId) {
        if let CellKind::Leaf(leaf) = &mut self.nodes[id.index()].kind {
            leaf.active = true;
        }
    }

    /// Return every matrix under `id` to its pool and drop the `active`
    /// flags. Safe on leaves owning nothing; calling twice is the same as
    /// calling once.
    pub fn clear_cell(&mut self, id: CellId) {
        match &mut self.nodes[id.index()].kind {
            CellKind::Internal { children } => {
                let children = *children;
                for child in children {
                    self.clear_cell(child);
                }
            }
            CellKind::Leaf(leaf) => {
                leaf.active = false;
                if let Some(handle) = leaf.collision.take() {
                    self.int_pool.give_back(handle);
                }
                if let Some(handle) = leaf.ladder.take() {
                    self.int_pool.give_back(handle);
                }
                if let Some(handle) = leaf.vector_x.take() {
                    self.float_pool.give_back(handle);
                }
                if let Some(handle) = leaf.vector_y.take() {
                    self.float_pool.give_back(handle);
                }
            }
        }
    }

    /// Clear every leaf in the world.
    pub fn clear_data(&mut self) {
        self.clear_cell(self.root);
    }

    /// Apply `action` to each immediate child of `id` satisfying
    /// `predicate`. Does not recurse; the tree search drives it level by
    /// level.
    pub fn for_each_child_matching(
        &self,
        id: CellId,
        predicate: impl Fn(CellId) -> bool,
        mut action: impl FnMut(CellId),
    ) {
        let CellKind::Internal { children } = &self.nodes[id.index()].kind else {
            return;
        };
        for &child in children {
            if predicate(child) {
                action(child);
            }
        }
    }

    /// Visit every leaf whose region intersects `region`, pruning whole
    /// subtrees that fall outside it.
    pub fn for_each_leaf_intersecting(&self, region: Region, mut action: impl FnMut(CellId)) {
        self.walk_intersecting(self.root, region, &mut action);
    }

    fn walk_intersecting(&self, id: CellId, region: Region, action: &mut impl FnMut(CellId)) {
        let cell = &self.nodes[id.index()];
        if !cell.region.intersects(&region) {
            return;
        }
        match &cell.kind {
            CellKind::Internal { children } => {
                for &child in children {
                    self.walk_intersecting(child, region, action);
                }
            }
            CellKind::Leaf(_) => action(id),
        }
    }

    pub fn is_collision_at(&self, x: i32, y: i32) -> bool {
        self.get_int(x, y, IntField::Collision) != 0
    }

    pub fn is_ladder_at(&self, x: i32, y: i32) -> bool {
        self.get_int(x, y, IntField::Ladder) != 0
    }

    /// Collision test that treats ladder cells as passable: false
    /// wherever ladder data is present, otherwise the collision result.
    pub fn is_solid_at(&self, x: i32, y: i32) -> bool {
        if self.is_ladder_at(x, y) {
            return false;
        }
        self.is_collision_at(x, y)
    }

    pub fn vector_x_at(&self, x: i32, y: i32) -> f32 {
        self.get_float(x, y, FloatField::VectorX)
    }

    pub fn vector_y_at(&self, x: i32, y: i32) -> f32 {
        self.get_float(x, y, FloatField::VectorY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_1024_512() -> CellTree {
        CellTree::new(1024, 1024, 512, 16, 16).unwrap()
    }

    #[test]
    fn construction_shape_depth_one() {
        let tree = tree_1024_512();
        assert_eq!(tree.region(tree.root()), Region::new(-512, -512, 512, 512));
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_count(), 4);
        for child in tree.children(tree.root()).unwrap() {
            assert!(!tree.has_children(child));
            assert_eq!(tree.region(child).width(), 512);
        }
    }

    #[test]
    fn world_smaller_than_leaf_is_single_leaf() {
        let tree = CellTree::new(100, 100, 512, 4, 4).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert!(!tree.has_children(tree.root()));
    }

    #[test]
    fn rectangular_world_rounds_up_to_square() {
        let tree = CellTree::new(1500, 300, 256, 64, 64).unwrap();
        // Smallest power-of-two multiple of 256 covering 1500 is 2048.
        assert_eq!(tree.region(tree.root()), Region::new(-1024, -1024, 1024, 1024));
        assert_eq!(tree.leaf_count(), 64);
    }

    #[test]
    fn invalid_configuration_rejected() {
        assert!(matches!(
            CellTree::new(0, 100, 64, 4, 4),
            Err(WorldBuildError::InvalidWorldSize { .. })
        ));
        assert!(matches!(
            CellTree::new(100, 100, -1, 4, 4),
            Err(WorldBuildError::InvalidLeafSize(-1))
        ));
    }

    #[test]
    fn containment_partition() {
        let tree = CellTree::new(1024, 1024, 256, 64, 64);
        let tree = tree.unwrap();
        let leaves: Vec<CellId> = (0..tree.node_count() as u32)
            .map(|i| CellId(i))
            .filter(|&id| !tree.has_children(id))
            .collect();

        for &(x, y) in &[(0, 0), (-512, -512), (511, 511), (-1, -1), (100, -300)] {
            let containing: Vec<&CellId> = leaves
                .iter()
                .filter(|&&id| tree.contains(id, x, y))
                .collect();
            assert_eq!(containing.len(), 1, "point ({x},{y})");
            assert_eq!(tree.leaf_at(x, y), Some(*containing[0]));
        }
    }

    #[test]
    fn zero_outside_invariant() {
        let mut tree = tree_1024_512();
        tree.increment(10, 10, IntField::Collision);

        // The sibling leaf covering negative coordinates holds no data at
        // (10,10) and must answer zero for a coordinate outside itself.
        let far_leaf = tree.leaf_at(-100, -100).unwrap();
        assert_eq!(tree.int_at(far_leaf, 10, 10, IntField::Collision), 0);
        assert_eq!(tree.float_at(far_leaf, 10, 10, FloatField::VectorX), 0.0);

        // Outside the whole world, every kind reads zero.
        assert_eq!(tree.get_int(5000, 5000, IntField::Collision), 0);
        assert_eq!(tree.get_int(5000, 5000, IntField::Ladder), 0);
        assert_eq!(tree.get_float(5000, 5000, FloatField::VectorY), 0.0);
    }

    #[test]
    fn increment_decrement_round_trip() {
        let mut tree = tree_1024_512();
        assert_eq!(tree.get_int(10, 10, IntField::Collision), 0);

        tree.increment(10, 10, IntField::Collision);
        tree.increment(10, 10, IntField::Collision);
        assert_eq!(tree.get_int(10, 10, IntField::Collision), 2);

        tree.decrement(10, 10, IntField::Collision);
        assert_eq!(tree.get_int(10, 10, IntField::Collision), 1);
        tree.decrement(10, 10, IntField::Collision);
        assert_eq!(tree.get_int(10, 10, IntField::Collision), 0);
    }

    #[test]
    #[should_panic(expected = "no Collision data")]
    fn decrement_without_data_fails_loudly() {
        let mut tree = tree_1024_512();
        tree.decrement(10, 10, IntField::Collision);
    }

    #[test]
    fn ladder_and_collision_matrices_are_independent() {
        let mut tree = tree_1024_512();
        tree.increment(10, 10, IntField::Ladder);
        assert!(tree.is_ladder_at(10, 10));
        assert!(!tree.is_collision_at(10, 10));
        assert_eq!(tree.int_matrices_taken(), 1);
    }

    #[test]
    fn solid_treats_ladder_as_passable() {
        let mut tree = tree_1024_512();
        tree.increment(10, 10, IntField::Collision);
        assert!(tree.is_solid_at(10, 10));

        tree.increment(10, 10, IntField::Ladder);
        assert!(!tree.is_solid_at(10, 10));
        assert!(tree.is_collision_at(10, 10));
    }

    #[test]
    fn vector_field_modification_accumulates() {
        let mut tree = tree_1024_512();
        tree.modify_vector_field_at(3, 4, |vx, vy| (vx + 1.5, vy - 0.5));
        tree.modify_vector_field_at(3, 4, |vx, vy| (vx + 1.5, vy - 0.5));
        assert_eq!(tree.vector_x_at(3, 4), 3.0);
        assert_eq!(tree.vector_y_at(3, 4), -1.0);
        assert_eq!(tree.float_matrices_taken(), 2);
    }

    #[test]
    fn activate_and_clear_idempotent() {
        let mut tree = tree_1024_512();
        tree.increment(10, 10, IntField::Collision);
        tree.modify_vector_field_at(10, 10, |_, _| (1.0, 2.0));
        tree.activate(10, 10);
        assert_eq!(tree.active_leaf_count(), 1);
        assert_eq!(tree.int_matrices_taken(), 1);
        assert_eq!(tree.float_matrices_taken(), 2);

        tree.clear_data();
        assert_eq!(tree.active_leaf_count(), 0);
        assert_eq!(tree.int_matrices_taken(), 0);
        assert_eq!(tree.float_matrices_taken(), 0);
        assert!(!tree.is_collision_at(10, 10));

        // Clearing twice is the same as clearing once.
        tree.clear_data();
        assert_eq!(tree.int_matrices_taken(), 0);
        assert_eq!(tree.float_matrices_taken(), 0);
    }

    #[test]
    fn cleared_matrices_come_back_zeroed() {
        let mut tree = tree_1024_512();
        tree.increment(10, 10, IntField::Collision);
        tree.clear_data();
        tree.increment(11, 11, IntField::Collision);
        // The reused matrix must not leak the previous activation's data.
        assert_eq!(tree.get_int(10, 10, IntField::Collision), 0);
        assert_eq!(tree.get_int(11, 11, IntField::Collision), 1);
    }

    #[test]
    fn increment_in_cell_ignores_foreign_points() {
        let mut tree = tree_1024_512();
        let leaf = tree.leaf_at(10, 10).unwrap();
        tree.increment_in_cell(leaf, 10, 10, IntField::Collision);
        // (-10,-10) belongs to a different quadrant; the restricted write
        // must not touch it.
        tree.increment_in_cell(leaf, -10, -10, IntField::Collision);
        assert_eq!(tree.get_int(10, 10, IntField::Collision), 1);
        assert_eq!(tree.get_int(-10, -10, IntField::Collision), 0);
        assert_eq!(tree.int_matrices_taken(), 1);
    }

    #[test]
    fn writes_outside_world_are_ignored() {
        let mut tree = tree_1024_512();
        tree.increment(5000, 5000, IntField::Collision);
        tree.modify_vector_field_at(5000, 5000, |_, _| (9.0, 9.0));
        assert_eq!(tree.int_matrices_taken(), 0);
        assert_eq!(tree.float_matrices_taken(), 0);
    }

    #[test]
    fn for_each_leaf_intersecting_prunes() {
        let tree = tree_1024_512();
        let mut visited = Vec::new();
        tree.for_each_leaf_intersecting(Region::new(0, 0, 100, 100), |id| visited.push(id));
        assert_eq!(visited.len(), 1);
        assert_eq!(visited[0], tree.leaf_at(10, 10).unwrap());

        let mut all = Vec::new();
        tree.for_each_leaf_intersecting(Region::new(-1, -1, 1, 1), |id| all.push(id));
        // A region straddling the origin touches all four quadrants.
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn for_each_child_matching_filters_immediate_children() {
        let tree = tree_1024_512();
        let mut matched = Vec::new();
        tree.for_each_child_matching(
            tree.root(),
            |id| tree.region(id).contains(10, 10),
            |id| matched.push(id),
        );
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0], tree.leaf_at(10, 10).unwrap());
    }
}
