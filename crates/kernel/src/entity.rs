use glam::IVec2;
use serde::{Deserialize, Serialize};
use tilespace_common::{EntityId, Region};

/// Margin added around an entity's bounds to form its graphics
/// neighborhood. Leaves within this margin of an entity index it, so data
/// is resident before the entity scrolls into view.
pub const GRAPHICS_NEIGHBORHOOD_MARGIN: i32 = 32;

/// Entity group. Groups are iterated in a fixed layer order; within a
/// group, entities order by (layer, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityGroup {
    Background,
    Terrain,
    Interactive,
    Actor,
    Foreground,
}

impl EntityGroup {
    pub const ALL: [EntityGroup; 5] = [
        EntityGroup::Background,
        EntityGroup::Terrain,
        EntityGroup::Interactive,
        EntityGroup::Actor,
        EntityGroup::Foreground,
    ];

    /// Position of this group in the canonical entity ordering.
    pub fn group_layer(self) -> i32 {
        match self {
            EntityGroup::Background => 0,
            EntityGroup::Terrain => 1,
            EntityGroup::Interactive => 2,
            EntityGroup::Actor => 3,
            EntityGroup::Foreground => 4,
        }
    }
}

/// What an entity contributes to the world's spatial data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    /// Solid tile of `width` x `height` cells, rotated by `rotation`
    /// radians around its origin cell.
    CollisionTile {
        width: i32,
        height: i32,
        rotation: f32,
    },
    /// One-cell-wide climbable column of `height` cells.
    Ladder { height: i32 },
    /// Rectangular field contributing a constant flow vector to every
    /// covered cell.
    FlowRegion {
        width: i32,
        height: i32,
        flow_x: f32,
        flow_y: f32,
    },
    /// Logic/decor entity with no spatial data contribution.
    Marker,
}

/// A world entity: identity, ordering keys, position, and its spatial
/// data contribution.
///
/// The graphics neighborhood is cached and recomputed on every move, so
/// the whereabouts rebuild reads it without recomputing geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    group: EntityGroup,
    layer: i32,
    position: IVec2,
    kind: EntityKind,
    neighborhood: Region,
}

impl Entity {
    pub fn new(group: EntityGroup, layer: i32, position: IVec2, kind: EntityKind) -> Self {
        let mut entity = Self {
            id: EntityId::new(),
            group,
            layer,
            position,
            kind,
            neighborhood: Region::new(0, 0, 0, 0),
        };
        entity.refresh_neighborhood();
        entity
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn group(&self) -> EntityGroup {
        self.group
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn position(&self) -> IVec2 {
        self.position
    }

    /// Move the entity, keeping the cached graphics neighborhood current.
    pub fn set_position(&mut self, position: IVec2) {
        self.position = position;
        self.refresh_neighborhood();
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Canonical ordering key: group layer, then per-entity layer, then id.
    pub fn ordering_key(&self) -> (i32, i32, u64) {
        (self.group.group_layer(), self.layer, self.id.0)
    }

    /// The rectangle used to decide which leaf cells index this entity.
    pub fn graphics_neighborhood(&self) -> Region {
        self.neighborhood
    }

    pub fn has_collision_geometry(&self) -> bool {
        matches!(self.kind, EntityKind::CollisionTile { .. })
    }

    /// Yield every world-integer point currently occupied by this
    /// entity's collision geometry. Rotated tiles rotate each local cell
    /// offset around the origin cell and round to the containing cell.
    pub fn each_collision_point(&self, f: &mut dyn FnMut(i32, i32)) {
        let EntityKind::CollisionTile {
            width,
            height,
            rotation,
        } = self.kind
        else {
            return;
        };
        if rotation == 0.0 {
            for j in 0..height {
                for i in 0..width {
                    f(self.position.x + i, self.position.y + j);
                }
            }
            return;
        }
        let (sn, cs) = rotation.sin_cos();
        for j in 0..height {
            for i in 0..width {
                let x = i as f32;
                let y = j as f32;
                let rx = (x * cs - y * sn).round() as i32;
                let ry = (x * sn + y * cs).round() as i32;
                f(self.position.x + rx, self.position.y + ry);
            }
        }
    }

    /// Yield every world-integer point covered by this entity's ladder
    /// column.
    pub fn each_ladder_point(&self, f: &mut dyn FnMut(i32, i32)) {
        let EntityKind::Ladder { height } = self.kind else {
            return;
        };
        for j in 0..height {
            f(self.position.x, self.position.y + j);
        }
    }

    /// Yield every (point, flow vector) pair this entity contributes to
    /// the vector field.
    pub fn each_flow_point(&self, f: &mut dyn FnMut(i32, i32, f32, f32)) {
        let EntityKind::FlowRegion {
            width,
            height,
            flow_x,
            flow_y,
        } = self.kind
        else {
            return;
        };
        for j in 0..height {
            for i in 0..width {
                f(self.position.x + i, self.position.y + j, flow_x, flow_y);
            }
        }
    }

    /// Unrotated occupancy bounds. Rotated collision tiles take the
    /// bounding box of their rotated corners.
    fn bounds(&self) -> Region {
        let p = self.position;
        match self.kind {
            EntityKind::CollisionTile {
                width,
                height,
                rotation,
            } => {
                if rotation == 0.0 {
                    Region::from_origin_size(p.x, p.y, width, height)
                } else {
                    let (sn, cs) = rotation.sin_cos();
                    let corners = [
                        (0.0, 0.0),
                        (width as f32, 0.0),
                        (0.0, height as f32),
                        (width as f32, height as f32),
                    ];
                    let mut min_x = f32::MAX;
                    let mut min_y = f32::MAX;
                    let mut max_x = f32::MIN;
                    let mut max_y = f32::MIN;
                    for (x, y) in corners {
                        let rx = x * cs - y * sn;
                        let ry = x * sn + y * cs;
                        min_x = min_x.min(rx);
                        min_y = min_y.min(ry);
                        max_x = max_x.max(rx);
                        max_y = max_y.max(ry);
                    }
                    Region::new(
                        p.x + min_x.floor() as i32,
                        p.y + min_y.floor() as i32,
                        p.x + max_x.ceil() as i32,
                        p.y + max_y.ceil() as i32,
                    )
                }
            }
            EntityKind::Ladder { height } => Region::from_origin_size(p.x, p.y, 1, height),
            EntityKind::FlowRegion { width, height, .. } => {
                Region::from_origin_size(p.x, p.y, width, height)
            }
            EntityKind::Marker => Region::from_origin_size(p.x, p.y, 1, 1),
        }
    }

    fn refresh_neighborhood(&mut self) {
        self.neighborhood = self.bounds().inflate(GRAPHICS_NEIGHBORHOOD_MARGIN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighborhood_tracks_position() {
        let mut e = Entity::new(
            EntityGroup::Terrain,
            0,
            IVec2::new(10, 10),
            EntityKind::CollisionTile {
                width: 2,
                height: 2,
                rotation: 0.0,
            },
        );
        let before = e.graphics_neighborhood();
        assert!(before.contains(10, 10));
        assert!(before.contains(11, 11));

        e.set_position(IVec2::new(500, 500));
        let after = e.graphics_neighborhood();
        assert!(!after.contains(10, 10));
        assert!(after.contains(500, 500));
    }

    #[test]
    fn collision_points_cover_unrotated_tile() {
        let e = Entity::new(
            EntityGroup::Terrain,
            0,
            IVec2::new(3, 4),
            EntityKind::CollisionTile {
                width: 2,
                height: 3,
                rotation: 0.0,
            },
        );
        let mut points = Vec::new();
        e.each_collision_point(&mut |x, y| points.push((x, y)));
        assert_eq!(points.len(), 6);
        assert!(points.contains(&(3, 4)));
        assert!(points.contains(&(4, 6)));
        assert!(!points.contains(&(5, 4)));
    }

    #[test]
    fn rotated_tile_uses_distinct_axes() {
        // A 3x1 strip rotated a quarter turn must land on the y axis,
        // not the diagonal the sin/sin formula would produce.
        let e = Entity::new(
            EntityGroup::Terrain,
            0,
            IVec2::new(0, 0),
            EntityKind::CollisionTile {
                width: 3,
                height: 1,
                rotation: std::f32::consts::FRAC_PI_2,
            },
        );
        let mut points = Vec::new();
        e.each_collision_point(&mut |x, y| points.push((x, y)));
        assert!(points.contains(&(0, 0)));
        assert!(points.contains(&(0, 1)));
        assert!(points.contains(&(0, 2)));
        assert!(!points.contains(&(1, 1)));
    }

    #[test]
    fn ladder_points_form_column() {
        let e = Entity::new(
            EntityGroup::Interactive,
            0,
            IVec2::new(7, -2),
            EntityKind::Ladder { height: 4 },
        );
        let mut points = Vec::new();
        e.each_ladder_point(&mut |x, y| points.push((x, y)));
        assert_eq!(points, vec![(7, -2), (7, -1), (7, 0), (7, 1)]);
    }

    #[test]
    fn marker_contributes_no_points() {
        let e = Entity::new(EntityGroup::Actor, 0, IVec2::new(0, 0), EntityKind::Marker);
        let mut count = 0;
        e.each_collision_point(&mut |_, _| count += 1);
        e.each_ladder_point(&mut |_, _| count += 1);
        e.each_flow_point(&mut |_, _, _, _| count += 1);
        assert_eq!(count, 0);
        assert!(!e.has_collision_geometry());
    }

    #[test]
    fn ordering_key_ranks_group_then_layer_then_id() {
        let terrain = Entity::new(EntityGroup::Terrain, 5, IVec2::ZERO, EntityKind::Marker);
        let actor = Entity::new(EntityGroup::Actor, 0, IVec2::ZERO, EntityKind::Marker);
        assert!(terrain.ordering_key() < actor.ordering_key());

        let low = Entity::new(EntityGroup::Actor, 1, IVec2::ZERO, EntityKind::Marker);
        let high = Entity::new(EntityGroup::Actor, 2, IVec2::ZERO, EntityKind::Marker);
        assert!(low.ordering_key() < high.ordering_key());
    }
}
