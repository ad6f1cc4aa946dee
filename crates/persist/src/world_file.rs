//! World-file JSON persistence.
//!
//! Format:
//! ```text
//! {
//!   "worldSizeX": 1024,
//!   "worldSizeY": 1024,
//!   "entities": [
//!     { "primitiveType": "CollisionTile", "x": 10, "y": 10, ... },
//!     ...
//!   ]
//! }
//! ```
//!
//! Loading is fail-closed: an unrecognized `primitiveType`, a malformed
//! entry, or an out-of-range field aborts the whole load. The streaming
//! core never sees a partially-valid world.

use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tilespace_kernel::{Entity, EntityGroup, EntityKind};

/// Errors from world-file operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Unknown `primitiveType` names and structurally malformed entries
    /// surface here.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("world dimensions must be positive, got {width}x{height}")]
    InvalidWorldSize { width: i32, height: i32 },
    #[error("entity {index} ({primitive_type}): {reason}")]
    InvalidEntity {
        index: usize,
        primitive_type: &'static str,
        reason: String,
    },
}

/// One persisted entity, tagged by `primitiveType`. This enum is the
/// type registry: deserializing any other tag fails the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "primitiveType")]
pub enum EntitySpec {
    CollisionTile {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        #[serde(default)]
        rotation: f32,
        #[serde(default)]
        layer: i32,
    },
    Ladder {
        x: i32,
        y: i32,
        height: i32,
        #[serde(default)]
        layer: i32,
    },
    FlowRegion {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        #[serde(rename = "flowX")]
        flow_x: f32,
        #[serde(rename = "flowY")]
        flow_y: f32,
        #[serde(default)]
        layer: i32,
    },
    Marker {
        x: i32,
        y: i32,
        #[serde(default)]
        layer: i32,
    },
}

impl EntitySpec {
    fn primitive_type(&self) -> &'static str {
        match self {
            EntitySpec::CollisionTile { .. } => "CollisionTile",
            EntitySpec::Ladder { .. } => "Ladder",
            EntitySpec::FlowRegion { .. } => "FlowRegion",
            EntitySpec::Marker { .. } => "Marker",
        }
    }

    fn validate(&self, index: usize) -> Result<(), WorldFileError> {
        let reject = |reason: String| {
            Err(WorldFileError::InvalidEntity {
                index,
                primitive_type: self.primitive_type(),
                reason,
            })
        };
        match *self {
            EntitySpec::CollisionTile { width, height, .. }
            | EntitySpec::FlowRegion { width, height, .. } => {
                if width <= 0 || height <= 0 {
                    return reject(format!("extent must be positive, got {width}x{height}"));
                }
            }
            EntitySpec::Ladder { height, .. } => {
                if height <= 0 {
                    return reject(format!("height must be positive, got {height}"));
                }
            }
            EntitySpec::Marker { .. } => {}
        }
        Ok(())
    }

    /// Construct the runtime entity this spec describes.
    pub fn build(&self) -> Entity {
        match *self {
            EntitySpec::CollisionTile {
                x,
                y,
                width,
                height,
                rotation,
                layer,
            } => Entity::new(
                EntityGroup::Terrain,
                layer,
                IVec2::new(x, y),
                EntityKind::CollisionTile {
                    width,
                    height,
                    rotation,
                },
            ),
            EntitySpec::Ladder { x, y, height, layer } => Entity::new(
                EntityGroup::Interactive,
                layer,
                IVec2::new(x, y),
                EntityKind::Ladder { height },
            ),
            EntitySpec::FlowRegion {
                x,
                y,
                width,
                height,
                flow_x,
                flow_y,
                layer,
            } => Entity::new(
                EntityGroup::Background,
                layer,
                IVec2::new(x, y),
                EntityKind::FlowRegion {
                    width,
                    height,
                    flow_x,
                    flow_y,
                },
            ),
            EntitySpec::Marker { x, y, layer } => Entity::new(
                EntityGroup::Actor,
                layer,
                IVec2::new(x, y),
                EntityKind::Marker,
            ),
        }
    }
}

impl From<&Entity> for EntitySpec {
    fn from(entity: &Entity) -> Self {
        let p = entity.position();
        let layer = entity.layer();
        match *entity.kind() {
            EntityKind::CollisionTile {
                width,
                height,
                rotation,
            } => EntitySpec::CollisionTile {
                x: p.x,
                y: p.y,
                width,
                height,
                rotation,
                layer,
            },
            EntityKind::Ladder { height } => EntitySpec::Ladder {
                x: p.x,
                y: p.y,
                height,
                layer,
            },
            EntityKind::FlowRegion {
                width,
                height,
                flow_x,
                flow_y,
            } => EntitySpec::FlowRegion {
                x: p.x,
                y: p.y,
                width,
                height,
                flow_x,
                flow_y,
                layer,
            },
            EntityKind::Marker => EntitySpec::Marker {
                x: p.x,
                y: p.y,
                layer,
            },
        }
    }
}

/// The persisted world: dimensions plus the entity list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldFile {
    #[serde(rename = "worldSizeX")]
    pub world_size_x: i32,
    #[serde(rename = "worldSizeY")]
    pub world_size_y: i32,
    pub entities: Vec<EntitySpec>,
}

impl WorldFile {
    /// Validate dimensions and every entity entry.
    pub fn validate(&self) -> Result<(), WorldFileError> {
        if self.world_size_x <= 0 || self.world_size_y <= 0 {
            return Err(WorldFileError::InvalidWorldSize {
                width: self.world_size_x,
                height: self.world_size_y,
            });
        }
        for (index, spec) in self.entities.iter().enumerate() {
            spec.validate(index)?;
        }
        Ok(())
    }

    /// Construct runtime entities from a validated file.
    pub fn build_entities(&self) -> Vec<Entity> {
        self.entities.iter().map(EntitySpec::build).collect()
    }
}

/// Load and validate a world file. Any failure rejects the whole file.
pub fn load_world_file(path: impl AsRef<Path>) -> Result<WorldFile, WorldFileError> {
    let file: WorldFile = serde_json::from_reader(std::fs::File::open(path.as_ref())?)?;
    file.validate()?;
    tracing::debug!(
        entities = file.entities.len(),
        width = file.world_size_x,
        height = file.world_size_y,
        "world file loaded"
    );
    Ok(file)
}

/// Write a world file as pretty-printed JSON.
pub fn save_world_file(path: impl AsRef<Path>, file: &WorldFile) -> Result<(), WorldFileError> {
    serde_json::to_writer_pretty(std::fs::File::create(path.as_ref())?, file)?;
    Ok(())
}
