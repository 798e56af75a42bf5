//! Move-level statistics shared across tree paths (all-moves-as-first).

use crate::util::AtomicF64;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Smallest owned statistics record: a visit counter plus an accumulated
/// score. Mutated in place for the lifetime of its owning node.
#[derive(Debug, Default)]
pub struct NodeStatistics {
    visits: AtomicU32,
    score_sum: AtomicF64,
}

impl NodeStatistics {
    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn score_sum(&self) -> f64 {
        self.score_sum.load()
    }

    /// Record one observed outcome for the move this record tracks.
    pub fn record(&self, utility: f64) {
        self.visits.fetch_add(1, Ordering::Relaxed);
        self.score_sum.fetch_add(utility);
    }

    pub fn average(&self) -> f64 {
        let visits = self.visits();
        if visits == 0 {
            0.0
        } else {
            self.score_sum() / f64::from(visits)
        }
    }
}

/// Keyed statistics table for GRAVE/AMAF backpropagation.
///
/// Append-only per key: a record is created once on first access and the same
/// record is returned (and mutated in place) on every later access.
#[derive(Debug, Default)]
pub struct GraveTable<K> {
    entries: RwLock<HashMap<K, Arc<NodeStatistics>>>,
}

impl<K: Clone + Eq + Hash> GraveTable<K> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Existing record for `key`, or a freshly stored zero-initialized one.
    pub fn get_or_create(&self, key: &K) -> Arc<NodeStatistics> {
        if let Some(stats) = self.entries.read().get(key) {
            return Arc::clone(stats);
        }
        Arc::clone(
            self.entries
                .write()
                .entry(key.clone())
                .or_insert_with(Arc::default),
        )
    }

    /// Existing record for `key`, if one was ever created.
    pub fn get(&self, key: &K) -> Option<Arc<NodeStatistics>> {
        self.entries.read().get(key).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates() {
        let stats = NodeStatistics::default();
        stats.record(1.0);
        stats.record(-0.5);
        assert_eq!(stats.visits(), 2);
        assert_eq!(stats.score_sum(), 0.5);
        assert_eq!(stats.average(), 0.25);
    }

    #[test]
    fn test_average_of_unvisited_is_zero() {
        let stats = NodeStatistics::default();
        assert_eq!(stats.average(), 0.0);
    }

    #[test]
    fn test_get_or_create_returns_same_record() {
        let table: GraveTable<u32> = GraveTable::new();
        let first = table.get_or_create(&7);
        first.record(1.0);
        let second = table.get_or_create(&7);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.visits(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_misses_return_none() {
        let table: GraveTable<u32> = GraveTable::new();
        assert!(table.get(&3).is_none());
        table.get_or_create(&3);
        assert!(table.get(&3).is_some());
        assert!(table.get(&4).is_none());
    }

    #[test]
    fn test_concurrent_get_or_create_single_record() {
        let table: GraveTable<u32> = GraveTable::new();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        table.get_or_create(&1).record(0.5);
                    }
                });
            }
        });
        assert_eq!(table.len(), 1);
        let stats = table.get(&1).unwrap();
        assert_eq!(stats.visits(), 800);
        assert_eq!(stats.score_sum(), 400.0);
    }
}
