//! Deduplicating value store

use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;

/// Concurrency-safe set of every value this node has learned.
///
/// Inserts are idempotent and nothing is ever removed; growth is unbounded,
/// which is accepted at this scale. The critical section covers only the set
/// operation itself, never I/O.
pub struct ValueStore<T> {
    values: Mutex<HashSet<T>>,
}

impl<T: Eq + Hash + Clone> ValueStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashSet::new()),
        }
    }

    /// Insert a value, returning whether it was newly inserted.
    ///
    /// A value already present is left untouched and `false` is returned.
    pub fn insert(&self, value: T) -> bool {
        self.values.lock().insert(value)
    }

    /// Membership test
    pub fn contains(&self, value: &T) -> bool {
        self.values.lock().contains(value)
    }

    /// Detached copy of the current contents, in unspecified order.
    ///
    /// The snapshot is safe to retain while the store keeps mutating.
    pub fn snapshot(&self) -> Vec<T> {
        self.values.lock().iter().cloned().collect()
    }

    /// Number of distinct values stored
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Whether the store holds no values
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl<T: Eq + Hash + Clone> Default for ValueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_insert_is_idempotent() {
        let store = ValueStore::new();

        assert!(store.insert(42));
        assert!(!store.insert(42));
        assert!(!store.insert(42));

        assert_eq!(store.snapshot(), vec![42]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ValueStore::new();
        store.insert(1);

        let snapshot = store.snapshot();
        store.insert(2);

        assert_eq!(snapshot, vec![1]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_empty_store() {
        let store: ValueStore<i64> = ValueStore::new();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
        assert!(!store.contains(&0));
    }

    #[test]
    fn test_concurrent_inserts_all_visible() {
        let store = Arc::new(ValueStore::new());

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        // Overlapping ranges so every value races with a
                        // duplicate insert from another worker.
                        store.insert(i64::from(worker % 4) * 100 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut values = store.snapshot();
        values.sort_unstable();
        assert_eq!(values.len(), 400);
        assert_eq!(values.first(), Some(&0));
        assert_eq!(values.last(), Some(&399));
    }

    #[test]
    fn test_generic_over_value_type() {
        let store = ValueStore::new();
        assert!(store.insert("alpha".to_string()));
        assert!(!store.insert("alpha".to_string()));
        assert!(store.contains(&"alpha".to_string()));
    }
}
