//! Single-slot transposition table for best-first search.
//!
//! No depth field and no replacement policy: the caller only stores
//! strictly-improving values, so every store overwrites unconditionally.

use crate::config::ConfigError;
use parking_lot::Mutex;

use super::{check_bits, primary_index, ValueKind};

#[derive(Clone, Debug)]
pub struct BestFirstEntry {
    pub full_hash: u64,
    pub value: f64,
    pub kind: ValueKind,
}

pub struct BestFirstTable {
    bits: u32,
    buckets: Box<[Mutex<Option<BestFirstEntry>>]>,
}

impl BestFirstTable {
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
        self.buckets = (0..count).map(|_| Mutex::new(None)).collect();
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
    pub fn retrieve(&self, full_hash: u64) -> Option<BestFirstEntry> {
        let slot = self.buckets[primary_index(full_hash, self.bits)].lock();
        slot.as_ref()
            .filter(|entry| entry.full_hash == full_hash)
            .cloned()
    }

    /// Store `entry`, overwriting whatever occupied its bucket.
    ///
    /// Precondition: `allocate` has been called.
    pub fn store(&self, entry: BestFirstEntry) {
        let index = primary_index(entry.full_hash, self.bits);
        *self.buckets[index].lock() = Some(entry);
    }

    pub fn num_entries(&self) -> usize {
        self.buckets
            .iter()
            .filter(|bucket| bucket.lock().is_some())
            .count()
    }
}
