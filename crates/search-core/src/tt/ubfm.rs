//! Unbounded transposition table for unbounded best-first search.
//!
//! Buckets grow without a slot capacity; a store overwrites the slot with a
//! matching full hash in place, otherwise it appends. Entries carry the
//! sorted scored-move list and the extra `Marked`/`Validated` value kinds
//! consumed by the heuristic-function-learning procedures layered on top of
//! the search.

use crate::config::ConfigError;
use parking_lot::Mutex;

use super::{check_bits, primary_index, ScoredMove, ValueKind};

#[derive(Clone, Debug)]
pub struct UnboundedEntry<M> {
    pub full_hash: u64,
    pub value: f64,
    pub kind: ValueKind,
    pub depth: u32,
    pub best_move: Option<M>,
    /// Sorted (best score first) candidate moves, when the search kept them.
    pub scored_moves: Option<Vec<ScoredMove<M>>>,
}

pub struct UnboundedTable<M> {
    bits: u32,
    buckets: Box<[Mutex<Vec<UnboundedEntry<M>>>]>,
}

impl<M: Clone> UnboundedTable<M> {
    /// Table addressed by the top `bits` bits of the hash. Starts
    /// unallocated.
    pub fn new(bits: u32) -> Result<Self, ConfigError> {
        check_bits(bits)?;
        Ok(Self {
            bits,
            buckets: Vec::new().into_boxed_slice(),
        })
    }

    pub fn allocate(&mut self) {
        let count = 1usize << self.bits;
        self.buckets = (0..count).map(|_| Mutex::new(Vec::new())).collect();
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
    pub fn retrieve(&self, full_hash: u64) -> Option<UnboundedEntry<M>> {
        let bucket = self.buckets[primary_index(full_hash, self.bits)].lock();
        bucket
            .iter()
            .find(|entry| entry.full_hash == full_hash)
            .cloned()
    }

    /// Store `entry`: overwrite the matching slot in place, or append.
    ///
    /// Precondition: `allocate` has been called.
    pub fn store(&self, entry: UnboundedEntry<M>) {
        let mut bucket = self.buckets[primary_index(entry.full_hash, self.bits)].lock();
        match bucket
            .iter_mut()
            .find(|existing| existing.full_hash == entry.full_hash)
        {
            Some(slot) => *slot = entry,
            None => bucket.push(entry),
        }
    }

    pub fn num_entries(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.lock().len()).sum()
    }
}
