//! Section pool (spec §4.3): a word together with a multiset of typed
//! connectors, keyed by `(head-word, disjunct-hash)`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::atoms::{find_or_create, find_or_create_tracked};
use crate::atomic_float::{atomic_add_f64, load_f64, store_f64};
use crate::hash_table::{HashTable, EMPTY_KEY, EMPTY_VALUE};
use crate::pool::Pool;

/// Fibonacci-hashing golden-ratio constant used to mix head-word into the
/// disjunct hash (spec §3, invariant 5).
const GOLDEN_RATIO_CONSTANT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Canonical section key: `disjunct_hash ^ (head_word * GOLDEN_RATIO_CONSTANT)`,
/// remapped to 0 if it would collide with the hash table's `EMPTY_KEY`
/// sentinel (spec §3, invariant 5).
#[inline]
pub fn canonical_key(head_word: u32, disjunct_hash: u64) -> u64 {
    let mixed = disjunct_hash ^ (head_word as u64).wrapping_mul(GOLDEN_RATIO_CONSTANT);
    if mixed == EMPTY_KEY {
        0
    } else {
        mixed
    }
}

/// SoA storage for the Section pool.
///
/// `next_in_chain` is a weak navigational link, not ownership: it is
/// rebuilt on demand by the cosine engine's `BuildDisjunctChains` stage and
/// carries no meaning outside a cosine computation (Design Notes §9).
pub struct SectionPool {
    table: HashTable,
    pool: Pool,
    head_word: Vec<AtomicU32>,
    disjunct_hash: Vec<AtomicU64>,
    count: Vec<AtomicU64>,
    next_in_chain: Vec<AtomicU32>,
}

impl SectionPool {
    pub fn new(table_capacity: u32, pool_capacity: u32, probe_limit: u32) -> Self {
        let cap = pool_capacity as usize;
        Self {
            table: HashTable::new(table_capacity as usize, probe_limit, false),
            pool: Pool::new(pool_capacity),
            head_word: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            disjunct_hash: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            count: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            next_in_chain: (0..cap).map(|_| AtomicU32::new(EMPTY_VALUE)).collect(),
        }
    }

    /// Batch find-or-create over `(head_word[i], disjunct_hash[i])` sections.
    pub fn find_or_create(&self, head_word: &[u32], disjunct_hash: &[u64]) -> Vec<u32> {
        use rayon::prelude::*;
        head_word
            .par_iter()
            .zip(disjunct_hash.par_iter())
            .map(|(&h, &d)| self.find_or_create_one(h, d))
            .collect()
    }

    pub fn find_or_create_one(&self, head_word: u32, disjunct_hash: u64) -> u32 {
        let key = canonical_key(head_word, disjunct_hash);
        find_or_create(&self.table, &self.pool, key, |idx| {
            self.head_word[idx as usize].store(head_word, Ordering::Relaxed);
            self.disjunct_hash[idx as usize].store(disjunct_hash, Ordering::Relaxed);
            self.count[idx as usize].store(0, Ordering::Relaxed);
            self.next_in_chain[idx as usize].store(EMPTY_VALUE, Ordering::Relaxed);
        })
    }

    /// Like [`Self::find_or_create_one`], but also reports whether this
    /// call created a brand-new section (used by the extractor to report a
    /// "new sections" summary counter).
    pub fn find_or_create_one_tracked(&self, head_word: u32, disjunct_hash: u64) -> (u32, bool) {
        let key = canonical_key(head_word, disjunct_hash);
        find_or_create_tracked(&self.table, &self.pool, key, |idx| {
            self.head_word[idx as usize].store(head_word, Ordering::Relaxed);
            self.disjunct_hash[idx as usize].store(disjunct_hash, Ordering::Relaxed);
            self.count[idx as usize].store(0, Ordering::Relaxed);
            self.next_in_chain[idx as usize].store(EMPTY_VALUE, Ordering::Relaxed);
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
    pub fn head_word(&self, idx: u32) -> u32 {
        self.head_word[idx as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_head_word(&self, idx: u32, head: u32) {
        self.head_word[idx as usize].store(head, Ordering::Relaxed);
    }

    #[inline]
    pub fn disjunct_hash(&self, idx: u32) -> u64 {
        self.disjunct_hash[idx as usize].load(Ordering::Relaxed)
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
    pub fn set_count(&self, idx: u32, value: f64) {
        store_f64(&self.count[idx as usize], value, Ordering::Relaxed);
    }

    #[inline]
    pub fn next_in_chain(&self, idx: u32) -> u32 {
        self.next_in_chain[idx as usize].load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_next_in_chain(&self, idx: u32, next: u32) {
        self.next_in_chain[idx as usize].store(next, Ordering::Release);
    }

    /// Atomically prepend `self_idx` onto the chain whose head currently
    /// lives in `next`, returning the previously-observed head. Used by
    /// the cosine engine's `BuildDisjunctChains` stage.
    #[inline]
    pub(crate) fn splice_into_chain(&self, self_idx: u32, prior_head: u32) {
        self.next_in_chain[self_idx as usize].store(prior_head, Ordering::Release);
    }

    pub fn reset(&self) {
        self.table.reset();
        let live = self.pool.len() as usize;
        for i in 0..live {
            self.head_word[i].store(0, Ordering::Relaxed);
            self.disjunct_hash[i].store(0, Ordering::Relaxed);
            self.count[i].store(0, Ordering::Relaxed);
            self.next_in_chain[i].store(EMPTY_VALUE, Ordering::Relaxed);
        }
        self.pool.reset();
    }

    pub const SENTINEL: u32 = EMPTY_VALUE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_heads_same_disjunct_are_distinct_sections() {
        // spec §3, invariant 4.
        let p = SectionPool::new(64, 32, 16);
        let a = p.find_or_create_one(10, 999);
        let b = p.find_or_create_one(20, 999);
        assert_ne!(a, b);
    }

    #[test]
    fn find_or_create_is_idempotent() {
        let p = SectionPool::new(64, 32, 16);
        let a = p.find_or_create_one(10, 999);
        let b = p.find_or_create_one(10, 999);
        assert_eq!(a, b);
    }

    #[test]
    fn key_never_collides_with_empty_key_sentinel() {
        // head_word * GOLDEN_RATIO_CONSTANT overflow-wraps to exactly
        // !disjunct_hash for some inputs; verify the remap kicks in.
        let head = 0u32;
        let disjunct_hash = EMPTY_KEY;
        assert_eq!(canonical_key(head, disjunct_hash), 0);
    }
}
