//! Registry of per-group solvers.

use std::sync::Arc;

use flux_core::GroupId;
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::local::LocalSolver;

/// Lazily populated map from [`GroupId`] to [`LocalSolver`].
///
/// Entries are never removed: a group's workspace is reused every frame
/// for the lifetime of the registry.
#[derive(Debug, Default)]
pub struct SolverRegistry {
    solvers: RwLock<IndexMap<GroupId, Arc<LocalSolver>>>,
}

impl SolverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The solver for `id`, creating it on first use. Never fails.
    pub fn acquire(&self, id: GroupId) -> Arc<LocalSolver> {
        if let Some(solver) = self.solvers.read().get(&id) {
            return Arc::clone(solver);
        }
        let mut solvers = self.solvers.write();
        let solver = solvers
            .entry(id)
            .or_insert_with(|| Arc::new(LocalSolver::new(id)));
        Arc::clone(solver)
    }

    /// The solver for `id`, if one has been created.
    pub fn get(&self, id: GroupId) -> Option<Arc<LocalSolver>> {
        self.solvers.read().get(&id).cloned()
    }

    /// Number of registered groups.
    pub fn len(&self) -> usize {
        self.solvers.read().len()
    }

    /// Whether no group has been registered.
    pub fn is_empty(&self) -> bool {
        self.solvers.read().is_empty()
    }

    /// Group ids in first-seen order.
    pub fn ids(&self) -> Vec<GroupId> {
        self.solvers.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_idempotent() {
        let registry = SolverRegistry::new();
        let id = GroupId(7);
        let a = registry.acquire(id);
        let b = registry.acquire(id);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(GroupId(8)).is_none());
    }

    #[test]
    fn ids_keep_first_seen_order() {
        let registry = SolverRegistry::new();
        for id in [3, 1, 2, 1] {
            registry.acquire(GroupId(id));
        }
        assert_eq!(registry.ids(), vec![GroupId(3), GroupId(1), GroupId(2)]);
    }

    #[test]
    fn concurrent_acquire_creates_one_solver() {
        let registry = Arc::new(SolverRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&registry);
                std::thread::spawn(move || r.acquire(GroupId(1)))
            })
            .collect();
        let solvers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(solvers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
