//! The world orchestrator: entity registration, whereabouts tracking,
//! region activation/deactivation, and the cached camera-neighborhood
//! query.
//!
//! # Invariants
//! - Between whereabouts rebuilds, the entity↔cell index and the leaf
//!   `active` flags are mutually consistent: every active leaf was loaded
//!   for a region that included it, and every indexed leaf reflects a
//!   current entity placement.
//! - The per-cycle set pools drain to zero outstanding borrows at the
//!   start of every rebuild; the list pool drains after every search.

use std::collections::HashMap;

use tilespace_common::{EntityId, Region};
use tilespace_kernel::{Entity, EntityGroups};

use crate::cell::{CellId, CellTree, FloatField, IntField, WorldBuildError};
use crate::pool::{IndexedSetPool, ListHandle, ListPool, SetHandle};

/// World construction parameters: dimensions, partition granularity, and
/// pool capacities.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub world_width: i32,
    pub world_height: i32,
    /// Side length of an indivisible cell.
    pub leaf_size: i32,
    pub int_matrix_capacity: usize,
    pub float_matrix_capacity: usize,
    /// Capacity of the pool backing entity→cells sets.
    pub cell_set_capacity: usize,
    /// Capacity of the pool backing cells→entities sets.
    pub entity_set_capacity: usize,
    /// Capacity of the tree-search scratch-list pool.
    pub list_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_width: 2048,
            world_height: 2048,
            leaf_size: 256,
            int_matrix_capacity: 256,
            float_matrix_capacity: 256,
            cell_set_capacity: 4096,
            entity_set_capacity: 4096,
            list_capacity: 32,
        }
    }
}

/// The orchestrator. Owns the cell tree (and through it the matrix
/// pools), the grouped entity collection, the set/list pools, and the
/// bidirectional entity↔leaf index.
///
/// Both index maps are replaced wholesale on every
/// [`register_entity_whereabouts`](Self::register_entity_whereabouts)
/// call; readers between rebuilds see a fully-old or fully-new mapping,
/// never a partial one (lock discipline is the caller's job, see
/// [`WorldHandle`](crate::WorldHandle)).
pub struct WorldRepresentation {
    tree: CellTree,
    entities: EntityGroups,
    /// Pool backing the values of `entity_to_cells`.
    cell_set_pool: IndexedSetPool<CellId>,
    /// Pool backing the values of `cell_to_entities`.
    entity_set_pool: IndexedSetPool<EntityId>,
    list_pool: ListPool<CellId>,
    entity_to_cells: HashMap<EntityId, SetHandle>,
    cell_to_entities: HashMap<CellId, SetHandle>,
    camera_cache: Vec<EntityId>,
    camera_cache_region: Region,
    camera_cache_stamp: u64,
    rebuild_stamp: u64,
}

impl WorldRepresentation {
    pub fn new(config: WorldConfig) -> Result<Self, WorldBuildError> {
        let tree = CellTree::new(
            config.world_width,
            config.world_height,
            config.leaf_size,
            config.int_matrix_capacity,
            config.float_matrix_capacity,
        )?;
        Ok(Self {
            tree,
            entities: EntityGroups::new(),
            cell_set_pool: IndexedSetPool::new(config.cell_set_capacity),
            entity_set_pool: IndexedSetPool::new(config.entity_set_capacity),
            list_pool: ListPool::new(config.list_capacity),
            entity_to_cells: HashMap::new(),
            cell_to_entities: HashMap::new(),
            camera_cache: Vec::new(),
            camera_cache_region: Region::new(0, 0, 0, 0),
            camera_cache_stamp: 0,
            rebuild_stamp: 0,
        })
    }

    pub fn tree(&self) -> &CellTree {
        &self.tree
    }

    pub fn entities(&self) -> &EntityGroups {
        &self.entities
    }

    /// Mutable entity access for movement/physics code. Callers that move
    /// entities between rebuilds and need the index current immediately
    /// must follow up with [`Self::update_location`].
    pub fn entities_mut(&mut self) -> &mut EntityGroups {
        &mut self.entities
    }

    /// Number of leaves currently holding index entries.
    pub fn indexed_cell_count(&self) -> usize {
        self.cell_to_entities.len()
    }

    /// Completed whereabouts rebuilds since construction.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_stamp
    }

    pub fn register_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.register(entity)
    }

    /// Remove an entity from the collection. Index entries naming it are
    /// dropped at the next whereabouts rebuild.
    pub fn unregister_entity(&mut self, id: EntityId) -> bool {
        self.entities.unregister(id)
    }

    /// Re-derive the index entries of a single entity from its current
    /// graphics neighborhood. For ad-hoc placements between rebuilds; the
    /// periodic rebuild supersedes it.
    pub fn update_location(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let neighborhood = entity.graphics_neighborhood();

        let Self {
            tree,
            cell_set_pool,
            entity_set_pool,
            entity_to_cells,
            cell_to_entities,
            ..
        } = self;

        if let Some(old) = entity_to_cells.remove(&id) {
            for &cell in cell_set_pool.get(old).iter() {
                if let Some(&members) = cell_to_entities.get(&cell) {
                    entity_set_pool.get_mut(members).remove(id);
                }
            }
            cell_set_pool.give_back(old);
        }

        let handle = cell_set_pool.borrow();
        tree.for_each_leaf_intersecting(neighborhood, |leaf| {
            cell_set_pool.get_mut(handle).insert(leaf);
            let members = *cell_to_entities
                .entry(leaf)
                .or_insert_with(|| entity_set_pool.borrow());
            entity_set_pool.get_mut(members).insert(id);
        });
        entity_to_cells.insert(id, handle);
    }

    /// The periodic full rebuild of the entity↔cell index and the camera
    /// cache.
    ///
    /// Returns every set borrowed by the previous cycle first and asserts
    /// the pools drained: a nonzero count means some path leaked a borrow
    /// and the collision/ladder counters can no longer be trusted.
    pub fn register_entity_whereabouts(&mut self, region: Region) {
        let _span = tracing::info_span!("register_entity_whereabouts").entered();

        for (_, handle) in self.entity_to_cells.drain() {
            self.cell_set_pool.give_back(handle);
        }
        for (_, handle) in self.cell_to_entities.drain() {
            self.entity_set_pool.give_back(handle);
        }
        assert_eq!(
            self.cell_set_pool.taken(),
            0,
            "cell-set borrows leaked across a whereabouts cycle"
        );
        assert_eq!(
            self.entity_set_pool.taken(),
            0,
            "entity-set borrows leaked across a whereabouts cycle"
        );

        let mut entity_to_cells = HashMap::with_capacity(self.entities.len());
        let mut cell_to_entities: HashMap<CellId, SetHandle> = HashMap::new();
        {
            let Self {
                tree,
                entities,
                cell_set_pool,
                entity_set_pool,
                ..
            } = self;
            entities.for_each_ordered(|entity| {
                let id = entity.id();
                let handle = cell_set_pool.borrow();
                tree.for_each_leaf_intersecting(entity.graphics_neighborhood(), |leaf| {
                    cell_set_pool.get_mut(handle).insert(leaf);
                    let members = *cell_to_entities
                        .entry(leaf)
                        .or_insert_with(|| entity_set_pool.borrow());
                    entity_set_pool.get_mut(members).insert(id);
                });
                entity_to_cells.insert(id, handle);
            });
        }
        self.entity_to_cells = entity_to_cells;
        self.cell_to_entities = cell_to_entities;

        self.rebuild_stamp += 1;
        self.recompute_camera_cache(region);

        tracing::debug!(
            entities = self.entities.len(),
            indexed_cells = self.cell_to_entities.len(),
            "whereabouts rebuilt"
        );
    }

    /// Entities indexed under leaves intersecting `region`, deduplicated
    /// and sorted by the canonical order. Recomputed only when the cache
    /// predates the last whereabouts rebuild or was built for a different
    /// region.
    pub fn entities_within_camera_bounds(&mut self, region: Region) -> &[EntityId] {
        if self.camera_cache_stamp < self.rebuild_stamp || self.camera_cache_region != region {
            self.recompute_camera_cache(region);
        }
        &self.camera_cache
    }

    fn recompute_camera_cache(&mut self, region: Region) {
        let Self {
            tree,
            entities,
            entity_set_pool,
            cell_to_entities,
            camera_cache,
            ..
        } = self;
        camera_cache.clear();
        tree.for_each_leaf_intersecting(region, |leaf| {
            if let Some(&members) = cell_to_entities.get(&leaf) {
                camera_cache.extend(entity_set_pool.get(members).iter());
            }
        });
        camera_cache.sort_by_key(|id| {
            entities
                .get(*id)
                .map(|e| e.ordering_key())
                .unwrap_or((i32::MAX, i32::MAX, u64::MAX))
        });
        camera_cache.dedup();
        self.camera_cache_region = region;
        self.camera_cache_stamp = self.rebuild_stamp;
    }

    /// Breadth-first search for indivisible cells matching `predicate`.
    ///
    /// One pooled list per tree level; the predicate filters the leaf
    /// level only; every intermediate list is discarded via
    /// `give_back_all_except`. The caller must give the returned list
    /// back once consumed.
    pub fn tree_search_indivisible_matching(
        &mut self,
        predicate: impl Fn(&CellTree, CellId) -> bool,
    ) -> ListHandle {
        let Self {
            tree, list_pool, ..
        } = self;
        tree_search(tree, list_pool, predicate)
    }

    /// Give back a list returned by the tree search.
    pub fn release_search_result(&mut self, handle: ListHandle) {
        self.list_pool.give_back(handle);
    }

    /// Read a tree-search result list.
    pub fn search_result(&self, handle: ListHandle) -> &[CellId] {
        self.list_pool.get(handle)
    }

    /// Deactivate and clear every active, indexed leaf that does NOT
    /// intersect `region`.
    pub fn clear_unused_data(&mut self, region: Region) {
        let _span = tracing::info_span!("clear_unused_data").entered();
        let Self {
            tree,
            list_pool,
            cell_to_entities,
            ..
        } = self;
        let result = tree_search(tree, list_pool, |t, id| {
            t.is_active(id)
                && !t.region(id).intersects(&region)
                && cell_to_entities.contains_key(&id)
        });
        let cleared = list_pool.get(result).len();
        for i in 0..cleared {
            let id = list_pool.get(result)[i];
            tree.clear_cell(id);
            tracing::trace!(cell = id.index(), "leaf evicted");
        }
        list_pool.give_back(result);
        assert_eq!(
            list_pool.taken(),
            0,
            "tree-search scratch lists leaked during eviction"
        );
        tracing::debug!(cleared, "cleared unused leaves");
    }

    /// Activate every inactive, indexed leaf intersecting `region` and
    /// replay the data contributions of the entities indexed under it.
    /// Points falling in neighbouring leaves are skipped here; each point
    /// is loaded exactly once, by its containing leaf.
    pub fn load_nearby_data(&mut self, region: Region) {
        let _span = tracing::info_span!("load_nearby_data").entered();
        let Self {
            tree,
            list_pool,
            entity_set_pool,
            cell_to_entities,
            entities,
            ..
        } = self;
        let result = tree_search(tree, list_pool, |t, id| {
            !t.is_active(id)
                && t.region(id).intersects(&region)
                && cell_to_entities.contains_key(&id)
        });
        let loaded = list_pool.get(result).len();
        for i in 0..loaded {
            let id = list_pool.get(result)[i];
            tree.activate_cell(id);
            let Some(&members) = cell_to_entities.get(&id) else {
                continue;
            };
            for &entity_id in entity_set_pool.get(members).iter() {
                let Some(entity) = entities.get(entity_id) else {
                    continue;
                };
                entity.each_collision_point(&mut |x, y| {
                    tree.increment_in_cell(id, x, y, IntField::Collision);
                });
                entity.each_ladder_point(&mut |x, y| {
                    tree.increment_in_cell(id, x, y, IntField::Ladder);
                });
                entity.each_flow_point(&mut |x, y, fx, fy| {
                    tree.modify_vector_field_in_cell(id, x, y, |vx, vy| (vx + fx, vy + fy));
                });
            }
            tracing::trace!(cell = id.index(), "leaf loaded");
        }
        list_pool.give_back(result);
        assert_eq!(
            list_pool.taken(),
            0,
            "tree-search scratch lists leaked during loading"
        );
        tracing::debug!(loaded, "loaded nearby leaves");
    }

    /// Re-sort every entity group after layer mutations.
    pub fn sort_all_layers(&mut self) {
        self.entities.sort_all_layers();
    }

    // Point-query and mutation passthroughs to the root cell.

    pub fn is_collision_at(&self, x: i32, y: i32) -> bool {
        self.tree.is_collision_at(x, y)
    }

    pub fn is_ladder_at(&self, x: i32, y: i32) -> bool {
        self.tree.is_ladder_at(x, y)
    }

    pub fn is_solid_at(&self, x: i32, y: i32) -> bool {
        self.tree.is_solid_at(x, y)
    }

    pub fn get_collision(&self, x: i32, y: i32) -> i32 {
        self.tree.get_int(x, y, IntField::Collision)
    }

    pub fn vector_x_at(&self, x: i32, y: i32) -> f32 {
        self.tree.get_float(x, y, FloatField::VectorX)
    }

    pub fn vector_y_at(&self, x: i32, y: i32) -> f32 {
        self.tree.get_float(x, y, FloatField::VectorY)
    }

    pub fn increment_collision_at(&mut self, x: i32, y: i32) {
        self.tree.increment(x, y, IntField::Collision);
    }

    pub fn decrement_collision_at(&mut self, x: i32, y: i32) {
        self.tree.decrement(x, y, IntField::Collision);
    }

    pub fn modify_vector_field_at(
        &mut self,
        x: i32,
        y: i32,
        f: impl FnOnce(f32, f32) -> (f32, f32),
    ) {
        self.tree.modify_vector_field_at(x, y, f);
    }

    pub fn activate(&mut self, x: i32, y: i32) {
        self.tree.activate(x, y);
    }

    /// Clear every leaf's data and active flag.
    pub fn clear_data(&mut self) {
        self.tree.clear_data();
    }
}

/// Level-by-level descent; filtering happens at the leaf level, where
/// the uniform tree depth puts every indivisible cell.
fn tree_search(
    tree: &CellTree,
    list_pool: &mut ListPool<CellId>,
    predicate: impl Fn(&CellTree, CellId) -> bool,
) -> ListHandle {
    let mut current = list_pool.borrow();
    if tree.has_children(tree.root()) {
        list_pool.get_mut(current).push(tree.root());
        loop {
            let next = list_pool.borrow();
            let first = list_pool.get(current)[0];
            let leaf_level = !tree.has_children(
                tree.children(first).expect("loop visits internal nodes")[0],
            );
            for i in 0..list_pool.get(current).len() {
                let id = list_pool.get(current)[i];
                tree.for_each_child_matching(
                    id,
                    |child| !leaf_level || predicate(tree, child),
                    |child| list_pool.get_mut(next).push(child),
                );
            }
            current = next;
            if leaf_level {
                break;
            }
        }
    } else if predicate(tree, tree.root()) {
        // Single-leaf world: the root itself is the only candidate.
        list_pool.get_mut(current).push(tree.root());
    }
    list_pool.give_back_all_except(current);
    current
}
