use std::collections::HashMap;

use tilespace_common::EntityId;

use crate::entity::{Entity, EntityGroup};

/// Grouped entity collection.
///
/// Entities live in one group each; groups iterate in group-layer order
/// and each group keeps its entities sorted by (layer, id). All ordered
/// iteration in the streaming core goes through this collection.
#[derive(Debug, Default)]
pub struct EntityGroups {
    entities: HashMap<EntityId, Entity>,
    groups: HashMap<EntityGroup, Vec<EntityId>>,
}

impl EntityGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Add an entity to its group, keeping the group sorted. Returns the id.
    pub fn register(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        let group = entity.group();
        self.entities.insert(id, entity);
        let members = self.groups.entry(group).or_default();
        members.push(id);
        self.sort_group(group);
        id
    }

    /// Remove an entity. Reports whether it was present.
    pub fn unregister(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.remove(&id) else {
            return false;
        };
        if let Some(members) = self.groups.get_mut(&entity.group()) {
            members.retain(|&m| m != id);
        }
        true
    }

    /// Apply `f` to every entity in canonical order: groups by group
    /// layer, entities within a group by (layer, id).
    pub fn for_each_ordered(&self, mut f: impl FnMut(&Entity)) {
        for group in EntityGroup::ALL {
            let Some(members) = self.groups.get(&group) else {
                continue;
            };
            for id in members {
                if let Some(entity) = self.entities.get(id) {
                    f(entity);
                }
            }
        }
    }

    /// Re-sort every group by (layer, id). Call after mutating entity
    /// layers.
    pub fn sort_all_layers(&mut self) {
        for group in EntityGroup::ALL {
            self.sort_group(group);
        }
    }

    fn sort_group(&mut self, group: EntityGroup) {
        let Some(members) = self.groups.get_mut(&group) else {
            return;
        };
        let entities = &self.entities;
        members.sort_by_key(|id| {
            entities
                .get(id)
                .map(|e| (e.layer(), e.id().0))
                .unwrap_or((i32::MAX, u64::MAX))
        });
    }
}
