//! Two-slot transposition table for alpha-beta search.
//!
//! Replacement policy within a bucket:
//! - an empty slot is filled first
//! - a slot holding the same full hash is overwritten only by strictly
//!   deeper data
//! - with both slots full and neither matching, the shallower slot is
//!   evicted; on a depth tie the first slot is freed after moving its
//!   contents to the second, so the older deep entry survives

use crate::config::ConfigError;
use parking_lot::Mutex;

use super::{check_bits, primary_index, ScoredMove, ValueKind};

/// One cached search result.
#[derive(Clone, Debug)]
pub struct AlphaBetaEntry<M> {
    pub full_hash: u64,
    pub value: f64,
    pub kind: ValueKind,
    pub depth: u32,
    pub best_move: Option<M>,
    /// Sorted (best score first) candidate moves, when the search kept them.
    pub scored_moves: Option<Vec<ScoredMove<M>>>,
}

struct Bucket<M> {
    slots: [Option<AlphaBetaEntry<M>>; 2],
}

impl<M> Default for Bucket<M> {
    fn default() -> Self {
        Self {
            slots: [None, None],
        }
    }
}

pub struct AlphaBetaTable<M> {
    bits: u32,
    buckets: Box<[Mutex<Bucket<M>>]>,
}

impl<M: Clone> AlphaBetaTable<M> {
    /// Table addressed by the top `bits` bits of the hash (`2^bits`
    /// buckets). Starts unallocated.
    pub fn new(bits: u32) -> Result<Self, ConfigError> {
        check_bits(bits)?;
        Ok(Self {
            bits,
            buckets: Vec::new().into_boxed_slice(),
        })
    }

    pub fn allocate(&mut self) {
        let count = 1usize << self.bits;
        self.buckets = (0..count).map(|_| Mutex::new(Bucket::default())).collect();
    }

    pub fn deallocate(&mut self) {
        self.buckets = Vec::new().into_boxed_slice();
    }

    pub fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Cached entry for `full_hash`, if present.
    ///
    /// Precondition: `allocate` has been called.
    pub fn retrieve(&self, full_hash: u64) -> Option<AlphaBetaEntry<M>> {
        let bucket = self.buckets[primary_index(full_hash, self.bits)].lock();
        bucket
            .slots
            .iter()
            .flatten()
            .find(|entry| entry.full_hash == full_hash)
            .cloned()
    }

    /// Store `entry` under the depth-preferred replacement policy.
    ///
    /// Precondition: `allocate` has been called.
    pub fn store(&self, entry: AlphaBetaEntry<M>) {
        let mut bucket = self.buckets[primary_index(entry.full_hash, self.bits)].lock();

        // Same position already cached: never overwrite with shallower data.
        if let Some(slot) = bucket
            .slots
            .iter_mut()
            .flatten()
            .find(|existing| existing.full_hash == entry.full_hash)
        {
            if entry.depth > slot.depth {
                *slot = entry;
            }
            return;
        }

        if let Some(slot) = bucket.slots.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(entry);
            return;
        }

        let depth0 = bucket.slots[0].as_ref().map_or(0, |e| e.depth);
        let depth1 = bucket.slots[1].as_ref().map_or(0, |e| e.depth);
        if depth0 < depth1 {
            bucket.slots[0] = Some(entry);
        } else if depth1 < depth0 {
            bucket.slots[1] = Some(entry);
        } else {
            let survivor = bucket.slots[0].take();
            bucket.slots[1] = survivor;
            bucket.slots[0] = Some(entry);
        }
    }

    pub fn num_entries(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| bucket.lock().slots.iter().flatten().count())
            .sum()
    }

    /// Sampled occupancy in `[0, 1]` over the first 1000 buckets.
    pub fn fill_rate(&self) -> f32 {
        let sample = self.buckets.len().min(1000);
        if sample == 0 {
            return 0.0;
        }
        let filled: usize = self
            .buckets
            .iter()
            .take(sample)
            .map(|bucket| bucket.lock().slots.iter().flatten().count())
            .sum();
        filled as f32 / (sample * 2) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(full_hash: u64, value: f64, depth: u32) -> AlphaBetaEntry<u16> {
        AlphaBetaEntry {
            full_hash,
            value,
            kind: ValueKind::Exact,
            depth,
            best_move: None,
            scored_moves: None,
        }
    }

    fn table(bits: u32) -> AlphaBetaTable<u16> {
        let mut table = AlphaBetaTable::new(bits).unwrap();
        table.allocate();
        table
    }

    #[test]
    fn test_round_trip() {
        let table = table(4);
        table.store(AlphaBetaEntry {
            full_hash: 0x1234_5678_9abc_def0,
            value: 0.5,
            kind: ValueKind::LowerBound,
            depth: 6,
            best_move: Some(42u16),
            scored_moves: Some(vec![
                ScoredMove { mv: 42, score: 1.5 },
                ScoredMove { mv: 7, score: 0.25 },
            ]),
        });

        let found = table.retrieve(0x1234_5678_9abc_def0).unwrap();
        assert_eq!(found.full_hash, 0x1234_5678_9abc_def0);
        assert_eq!(found.value, 0.5);
        assert_eq!(found.kind, ValueKind::LowerBound);
        assert_eq!(found.depth, 6);
        assert_eq!(found.best_move, Some(42));
        assert_eq!(found.scored_moves.unwrap().len(), 2);
    }

    #[test]
    fn test_miss_returns_none() {
        let table = table(4);
        assert!(table.retrieve(99).is_none());
    }

    #[test]
    fn test_shallower_restore_is_rejected() {
        let table = table(4);
        let hash = 0xdead_beef_0000_0001;
        table.store(entry(hash, 1.0, 2));
        table.store(entry(hash, 2.0, 1));
        let found = table.retrieve(hash).unwrap();
        assert_eq!(found.depth, 2);
        assert_eq!(found.value, 1.0);

        table.store(entry(hash, 3.0, 5));
        let found = table.retrieve(hash).unwrap();
        assert_eq!(found.depth, 5);
        assert_eq!(found.value, 3.0);
    }

    #[test]
    fn test_equal_depth_restore_is_a_noop() {
        let table = table(4);
        let hash = 0xdead_beef_0000_0002;
        table.store(entry(hash, 1.0, 3));
        table.store(entry(hash, 9.0, 3));
        assert_eq!(table.retrieve(hash).unwrap().value, 1.0);
    }

    #[test]
    fn test_full_bucket_evicts_shallowest() {
        // bits = 1: hashes with a clear top bit collide into bucket 0.
        let table = table(1);
        table.store(entry(1, 0.1, 1));
        table.store(entry(2, 0.2, 4));
        table.store(entry(3, 0.3, 3));

        assert!(table.retrieve(1).is_none(), "shallowest entry evicted");
        assert_eq!(table.retrieve(2).unwrap().depth, 4);
        assert_eq!(table.retrieve(3).unwrap().depth, 3);
        assert_eq!(table.num_entries(), 2);
    }

    #[test]
    fn test_depth_tie_frees_first_slot() {
        let table = table(1);
        table.store(entry(1, 0.1, 2));
        table.store(entry(2, 0.2, 2));
        table.store(entry(3, 0.3, 2));

        // The first slot's occupant moves over the second; the newcomer
        // takes the freed slot.
        assert!(table.retrieve(1).is_some());
        assert!(table.retrieve(2).is_none());
        assert!(table.retrieve(3).is_some());
    }

    #[test]
    fn test_num_entries_and_fill_rate() {
        let table = table(2);
        assert_eq!(table.num_entries(), 0);
        assert_eq!(table.fill_rate(), 0.0);

        table.store(entry(0, 0.0, 1));
        table.store(entry(1u64 << 62, 0.0, 1));
        assert_eq!(table.num_entries(), 2);
        assert!((table.fill_rate() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_deallocate_drops_contents() {
        let mut table = table(4);
        table.store(entry(5, 0.5, 1));
        assert!(table.is_allocated());
        table.deallocate();
        assert!(!table.is_allocated());
        table.allocate();
        assert!(table.retrieve(5).is_none());
    }

    #[test]
    #[should_panic]
    fn test_retrieve_before_allocate_is_a_programming_error() {
        let table: AlphaBetaTable<u16> = AlphaBetaTable::new(4).unwrap();
        let _ = table.retrieve(1);
    }

    #[test]
    fn test_invalid_bits_rejected() {
        assert!(AlphaBetaTable::<u16>::new(0).is_err());
        assert!(AlphaBetaTable::<u16>::new(31).is_err());
    }
}
