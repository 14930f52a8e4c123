use std::collections::HashMap;

use super::CellId;

/// Per-cell ordered dependency sets plus the reverse (dependents) index.
///
/// Keyed by stable cell identity instead of holding the cells themselves;
/// a `destroyed` notification evicts the cell's entries via [`Self::evict`].
#[derive(Debug, Default)]
pub(crate) struct DependencyMap {
    dependencies: HashMap<CellId, Vec<CellId>>,
    dependents: HashMap<CellId, Vec<CellId>>,
}

impl DependencyMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends `dependency` to `cell`'s set. Returns false if already present.
    pub(crate) fn add(
        &mut self,
        cell: CellId,
        dependency: CellId,
    ) -> bool {
        let deps = self.dependencies.entry(cell).or_default();
        if deps.contains(&dependency) {
            return false;
        }
        deps.push(dependency);

        let dependents = self.dependents.entry(dependency).or_default();
        if !dependents.contains(&cell) {
            dependents.push(cell);
        }
        true
    }

    /// Replaces `cell`'s dependency set with an empty one
    pub(crate) fn clear(
        &mut self,
        cell: CellId,
    ) {
        let Some(previous) = self.dependencies.get_mut(&cell).map(std::mem::take) else {
            return;
        };

        for dependency in previous {
            self.unlink_dependent(dependency, cell);
        }
    }

    /// Drops every entry owned by a reclaimed cell
    pub(crate) fn evict(
        &mut self,
        cell: CellId,
    ) {
        if let Some(previous) = self.dependencies.remove(&cell) {
            for dependency in previous {
                self.unlink_dependent(dependency, cell);
            }
        }
        self.dependents.remove(&cell);
    }

    pub(crate) fn dependencies_of(
        &self,
        cell: CellId,
    ) -> Vec<CellId> {
        self.dependencies.get(&cell).cloned().unwrap_or_default()
    }

    pub(crate) fn dependents_of(
        &self,
        cell: CellId,
    ) -> Vec<CellId> {
        self.dependents.get(&cell).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn tracked_cells(&self) -> usize {
        self.dependencies.len()
    }

    fn unlink_dependent(
        &mut self,
        dependency: CellId,
        cell: CellId,
    ) {
        if let Some(dependents) = self.dependents.get_mut(&dependency) {
            dependents.retain(|c| *c != cell);
            if dependents.is_empty() {
                self.dependents.remove(&dependency);
            }
        }
    }
}
