//! Word pool (spec §4.3): atomic symbols keyed by a caller-supplied
//! 64-bit content hash.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::atoms::find_or_create_batch;
use crate::atomic_float::{atomic_add_f64, load_f64, store_f64};
use crate::hash_table::{HashTable, EMPTY_VALUE};
use crate::pool::Pool;

/// SoA storage for the Word pool.
///
/// - `name_hash`: the content hash the word was created from.
/// - `count`: observation count (marginal), updated by the counting
///   pipeline.
/// - `class_id`: 0 = unclassified; written by class substitution's
///   `AssignClasses` stage.
/// - `norm_squared`: auxiliary accumulator written by the cosine engine's
///   `ComputeWordNorms` stage.
pub struct WordPool {
    table: HashTable,
    pool: Pool,
    name_hash: Vec<AtomicU64>,
    count: Vec<AtomicU64>,
    class_id: Vec<AtomicU32>,
    norm_squared: Vec<AtomicU64>,
}

impl WordPool {
    pub fn new(table_capacity: u32, pool_capacity: u32, probe_limit: u32) -> Self {
        let cap = pool_capacity as usize;
        Self {
            table: HashTable::new(table_capacity as usize, probe_limit, false),
            pool: Pool::new(pool_capacity),
            name_hash: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            count: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            class_id: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            norm_squared: (0..cap).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Batch find-or-create over content hashes. Duplicate hashes in the
    /// batch, and duplicate hashes across calls, always resolve to the
    /// same index (spec §8: idempotent and stable).
    pub fn find_or_create(&self, hashes: &[u64]) -> Vec<u32> {
        find_or_create_batch(&self.table, &self.pool, hashes, |idx, key| {
            self.name_hash[idx as usize].store(key, Ordering::Relaxed);
            self.count[idx as usize].store(0, Ordering::Relaxed);
            self.class_id[idx as usize].store(0, Ordering::Relaxed);
            self.norm_squared[idx as usize].store(0, Ordering::Relaxed);
        })
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.pool.len()
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn name_hash(&self, idx: u32) -> u64 {
        self.name_hash[idx as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn count(&self, idx: u32) -> f64 {
        load_f64(&self.count[idx as usize], Ordering::Relaxed)
    }

    #[inline]
    pub fn add_count(&self, idx: u32, delta: f64) {
        atomic_add_f64(&self.count[idx as usize], delta);
    }

    #[inline]
    pub fn class_id(&self, idx: u32) -> u32 {
        self.class_id[idx as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_class_id(&self, idx: u32, class_id: u32) {
        self.class_id[idx as usize].store(class_id, Ordering::Relaxed);
    }

    #[inline]
    pub fn norm_squared(&self, idx: u32) -> f64 {
        load_f64(&self.norm_squared[idx as usize], Ordering::Relaxed)
    }

    #[inline]
    pub fn add_norm_squared(&self, idx: u32, delta: f64) {
        atomic_add_f64(&self.norm_squared[idx as usize], delta);
    }

    #[inline]
    pub fn reset_norm_squared(&self, idx: u32) {
        store_f64(&self.norm_squared[idx as usize], 0.0, Ordering::Relaxed);
    }

    /// Reset the table and zero every live SoA slot (session reset).
    pub fn reset(&self) {
        self.table.reset();
        let live = self.pool.len() as usize;
        for i in 0..live {
            self.name_hash[i].store(0, Ordering::Relaxed);
            self.count[i].store(0, Ordering::Relaxed);
            self.class_id[i].store(0, Ordering::Relaxed);
            self.norm_squared[i].store(0, Ordering::Relaxed);
        }
        self.pool.reset();
    }

    pub const SENTINEL: u32 = EMPTY_VALUE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_hashes_return_same_index() {
        let p = WordPool::new(64, 32, 16);
        let hashes = [1, 2, 3, 1, 2, 4, 2];
        let idx = p.find_or_create(&hashes);
        assert_eq!(idx[0], idx[3]);
        assert_eq!(idx[1], idx[4]);
        assert_eq!(idx[1], idx[6]);
        assert_ne!(idx[0], idx[1]);
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn find_or_create_is_idempotent_across_calls() {
        let p = WordPool::new(64, 32, 16);
        let first = p.find_or_create(&[77])[0];
        let second = p.find_or_create(&[77])[0];
        assert_eq!(first, second);
    }

    #[test]
    fn word_dedup_scenario() {
        // spec §8 scenario 1: 26 hashes, 6 duplicates of earlier entries.
        let p = WordPool::new(64, 32, 16);
        let originals: Vec<u64> = (0..20).collect();
        let dups = vec![0u64, 3, 7, 12, 19, 5];
        let mut batch = originals.clone();
        batch.extend(dups.iter().copied());
        let idx = p.find_or_create(&batch);
        assert_eq!(p.len(), 20);
        for (i, &h) in dups.iter().enumerate() {
            let original_pos = originals.iter().position(|&x| x == h).unwrap();
            assert_eq!(idx[20 + i], idx[original_pos]);
        }
    }
}
