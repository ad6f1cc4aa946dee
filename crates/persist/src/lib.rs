//! Persistence: the world file.
//!
//! # Invariants
//! - Loading is fail-closed: one bad entry rejects the whole file.
//! - The streaming core only ever consumes validated, constructed
//!   entities.

mod world_file;

pub use world_file::{load_world_file, save_world_file, EntitySpec, WorldFile, WorldFileError};

pub fn crate_info() -> &'static str {
    "tilespace-persist v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("persist"));
    }
}
