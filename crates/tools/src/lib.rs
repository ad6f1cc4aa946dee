//! Developer tooling: read-only world inspection.
//!
//! # Invariants
//! - Inspection never mutates world state.

mod inspector;

pub use inspector::{WorldInspector, WorldSummary};

pub fn crate_info() -> &'static str {
    "tilespace-tools v0.1.0"
}
