//! Pair pool (spec §4.3): an unordered binary relation between two words,
//! canonically keyed so that `(a, b)` and `(b, a)` resolve to the same
//! entry (spec §3, invariant 1 and 5).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::atoms::{find_or_create, find_or_create_tracked};
use crate::atomic_float::{atomic_add_f64, load_f64, store_f64};
use crate::hash_table::{HashTable, EMPTY_VALUE};
use crate::pool::Pool;

/// Canonical pair key: `(min(a, b) << 32) | max(a, b)` (spec §3, invariant 5).
#[inline]
pub fn canonical_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

/// SoA storage for the Pair pool.
pub struct PairPool {
    table: HashTable,
    pool: Pool,
    word_a: Vec<AtomicU32>,
    word_b: Vec<AtomicU32>,
    count: Vec<AtomicU64>,
    mi: Vec<AtomicU64>,
    dirty: Vec<AtomicU32>,
}

impl PairPool {
    pub fn new(table_capacity: u32, pool_capacity: u32, probe_limit: u32) -> Self {
        let cap = pool_capacity as usize;
        Self {
            table: HashTable::new(table_capacity as usize, probe_limit, false),
            pool: Pool::new(pool_capacity),
            word_a: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            word_b: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            count: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            mi: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            dirty: (0..cap).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Batch find-or-create over `(word_a[i], word_b[i])` pairs.
    pub fn find_or_create(&self, word_a: &[u32], word_b: &[u32]) -> Vec<u32> {
        use rayon::prelude::*;
        word_a
            .par_iter()
            .zip(word_b.par_iter())
            .map(|(&a, &b)| self.find_or_create_one(a, b))
            .collect()
    }

    /// Find-or-create a single canonicalized pair. Shared by the batch API,
    /// the counting pipeline, and the cosine engine's candidate logic where
    /// applicable.
    pub fn find_or_create_one(&self, a: u32, b: u32) -> u32 {
        let key = canonical_key(a, b);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        find_or_create(&self.table, &self.pool, key, |idx| {
            self.word_a[idx as usize].store(lo, Ordering::Relaxed);
            self.word_b[idx as usize].store(hi, Ordering::Relaxed);
            self.count[idx as usize].store(0, Ordering::Relaxed);
            self.mi[idx as usize].store(0, Ordering::Relaxed);
            self.dirty[idx as usize].store(0, Ordering::Relaxed);
        })
    }

    /// Like [`Self::find_or_create_one`], but also reports whether this
    /// call created a brand-new pair (used by the counting pipeline to
    /// report a "new pairs" summary counter).
    pub fn find_or_create_one_tracked(&self, a: u32, b: u32) -> (u32, bool) {
        let key = canonical_key(a, b);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        find_or_create_tracked(&self.table, &self.pool, key, |idx| {
            self.word_a[idx as usize].store(lo, Ordering::Relaxed);
            self.word_b[idx as usize].store(hi, Ordering::Relaxed);
            self.count[idx as usize].store(0, Ordering::Relaxed);
            self.mi[idx as usize].store(0, Ordering::Relaxed);
            self.dirty[idx as usize].store(0, Ordering::Relaxed);
        })
    }

    /// Look up an existing pair's index without creating one. Used by the
    /// rebuild stage of class substitution, which claims keys itself.
    pub(crate) fn table(&self) -> &HashTable {
        &self.table
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
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
    pub fn word_a(&self, idx: u32) -> u32 {
        self.word_a[idx as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn word_b(&self, idx: u32) -> u32 {
        self.word_b[idx as usize].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_words(&self, idx: u32, a: u32, b: u32) {
        self.word_a[idx as usize].store(a, Ordering::Relaxed);
        self.word_b[idx as usize].store(b, Ordering::Relaxed);
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
    pub fn mi(&self, idx: u32) -> f64 {
        load_f64(&self.mi[idx as usize], Ordering::Relaxed)
    }

    #[inline]
    pub fn set_mi(&self, idx: u32, value: f64) {
        store_f64(&self.mi[idx as usize], value, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dirty(&self, idx: u32) -> bool {
        self.dirty[idx as usize].load(Ordering::Relaxed) == 1
    }

    #[inline]
    pub fn set_dirty(&self, idx: u32, dirty: bool) {
        self.dirty[idx as usize].store(dirty as u32, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.table.reset();
        let live = self.pool.len() as usize;
        for i in 0..live {
            self.word_a[i].store(0, Ordering::Relaxed);
            self.word_b[i].store(0, Ordering::Relaxed);
            self.count[i].store(0, Ordering::Relaxed);
            self.mi[i].store(0, Ordering::Relaxed);
            self.dirty[i].store(0, Ordering::Relaxed);
        }
        self.pool.reset();
    }

    pub const SENTINEL: u32 = EMPTY_VALUE;
}
