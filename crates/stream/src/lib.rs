//! Spatial streaming core: quadtree partition, object pools, world
//! orchestrator, background cadence.
//!
//! # Invariants
//! - Steady-state streaming performs no allocation: every transient
//!   buffer is pool-backed and every pool drains after its cycle.
//! - Leaf data and the entity↔cell index stay mutually consistent
//!   between whereabouts rebuilds.

mod cell;
mod driver;
mod pool;
mod world;

pub use cell::{CellId, CellTree, FloatField, IntField, WorldBuildError};
pub use driver::{CameraFeed, StreamingDriver, WorldHandle};
pub use pool::{IndexedSet, IndexedSetPool, ListHandle, ListPool, Matrix, MatrixHandle, MatrixPool, SetHandle};
pub use world::{WorldConfig, WorldRepresentation};

pub fn crate_info() -> &'static str {
    "tilespace-stream v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("stream"));
    }
}
