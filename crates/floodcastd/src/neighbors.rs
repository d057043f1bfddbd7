//! Neighbor table: this node's fanout set

use floodcast_core::NodeId;
use parking_lot::RwLock;

/// The node's current out-edges in the dissemination topology.
///
/// Replaced wholesale on topology updates and read concurrently by in-flight
/// relay tasks; readers never observe a torn mix of old and new entries.
/// Entries are sorted and deduplicated on install so iteration order is
/// deterministic and no (value, neighbor) pair can be spawned twice.
///
/// Identities are not validated here. An unreachable or unknown identifier
/// is a delivery-layer failure, not a configuration error.
pub struct NeighborTable {
    neighbors: RwLock<Vec<NodeId>>,
}

impl NeighborTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            neighbors: RwLock::new(Vec::new()),
        }
    }

    /// Atomically replace the fanout set, canonicalizing by sort + dedup
    pub fn set(&self, mut neighbors: Vec<NodeId>) {
        neighbors.sort();
        neighbors.dedup();
        *self.neighbors.write() = neighbors;
    }

    /// Snapshot of the current fanout set
    pub fn get(&self) -> Vec<NodeId> {
        self.neighbors.read().clone()
    }

    /// Number of neighbors
    pub fn len(&self) -> usize {
        self.neighbors.read().len()
    }

    /// Whether the fanout set is empty
    pub fn is_empty(&self) -> bool {
        self.neighbors.read().is_empty()
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_canonicalizes() {
        let table = NeighborTable::new();
        table.set(vec!["n3".into(), "n2".into(), "n2".into(), "n1".into()]);

        assert_eq!(table.get(), vec!["n1".into(), "n2".into(), "n3".into()]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_set_replaces_wholesale() {
        let table = NeighborTable::new();
        table.set(vec!["n2".into(), "n3".into()]);
        table.set(vec!["n4".into()]);

        assert_eq!(table.get(), vec!["n4".into()]);
    }

    #[test]
    fn test_starts_empty() {
        let table = NeighborTable::new();
        assert!(table.is_empty());
        assert!(table.get().is_empty());
    }

    #[test]
    fn test_readers_never_observe_torn_sets() {
        let table = Arc::new(NeighborTable::new());
        let old: Vec<NodeId> = vec!["n1".into(), "n2".into()];
        let new: Vec<NodeId> = vec!["n3".into(), "n4".into(), "n5".into()];
        table.set(old.clone());

        let writer = {
            let table = table.clone();
            let new = new.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    table.set(new.clone());
                }
            })
        };

        for _ in 0..500 {
            let seen = table.get();
            assert!(seen == old || seen == new, "torn set: {seen:?}");
        }
        writer.join().unwrap();
    }
}
