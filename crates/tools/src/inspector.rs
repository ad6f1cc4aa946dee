use tilespace_stream::WorldRepresentation;

/// World inspector for developer tooling.
///
/// Read-only queries against the orchestrator for debugging, profiling,
/// and development UI.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the streaming state.
    pub fn summary(world: &WorldRepresentation) -> WorldSummary {
        let tree = world.tree();
        WorldSummary {
            entities: world.entities().len(),
            leaves: tree.leaf_count(),
            active_leaves: tree.active_leaf_count(),
            indexed_cells: world.indexed_cell_count(),
            rebuilds: world.rebuild_count(),
            int_matrices_taken: tree.int_matrices_taken(),
            float_matrices_taken: tree.float_matrices_taken(),
        }
    }
}

/// Snapshot of streaming state for the inspector.
#[derive(Debug, Clone)]
pub struct WorldSummary {
    pub entities: usize,
    pub leaves: usize,
    pub active_leaves: usize,
    pub indexed_cells: usize,
    pub rebuilds: u64,
    pub int_matrices_taken: usize,
    pub float_matrices_taken: usize,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: entities={} leaves={}/{} active, indexed={} rebuilds={} matrices={}i/{}f",
            self.entities,
            self.active_leaves,
            self.leaves,
            self.indexed_cells,
            self.rebuilds,
            self.int_matrices_taken,
            self.float_matrices_taken
        )
    }
}
