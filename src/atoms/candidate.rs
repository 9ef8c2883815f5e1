//! Candidate pool (spec §3, §4.7): transient word-pair entries that
//! accumulate a dot product during cosine computation. Keyed the same way
//! as the Pair pool (canonical `(min << 32) | max`), but lives in its own
//! pool/table so a cosine pass never disturbs the persistent Pair pool.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::atoms::find_or_create;
use crate::atoms::pair::canonical_key;
use crate::atomic_float::{atomic_add_f64, load_f64, store_f64};
use crate::hash_table::{HashTable, EMPTY_VALUE};
use crate::pool::Pool;

pub struct CandidatePool {
    table: HashTable,
    pool: Pool,
    word_a: Vec<AtomicU32>,
    word_b: Vec<AtomicU32>,
    dot: Vec<AtomicU64>,
    cosine: Vec<AtomicU64>,
}

impl CandidatePool {
    pub fn new(table_capacity: u32, pool_capacity: u32, probe_limit: u32) -> Self {
        let cap = pool_capacity as usize;
        Self {
            table: HashTable::new(table_capacity as usize, probe_limit, false),
            pool: Pool::new(pool_capacity),
            word_a: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            word_b: (0..cap).map(|_| AtomicU32::new(0)).collect(),
            dot: (0..cap).map(|_| AtomicU64::new(0)).collect(),
            cosine: (0..cap).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn find_or_create_one(&self, a: u32, b: u32) -> u32 {
        let key = canonical_key(a, b);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        find_or_create(&self.table, &self.pool, key, |idx| {
            self.word_a[idx as usize].store(lo, Ordering::Relaxed);
            self.word_b[idx as usize].store(hi, Ordering::Relaxed);
            self.dot[idx as usize].store(0, Ordering::Relaxed);
            self.cosine[idx as usize].store(0, Ordering::Relaxed);
        })
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.pool.len()
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
    pub fn dot(&self, idx: u32) -> f64 {
        load_f64(&self.dot[idx as usize], Ordering::Relaxed)
    }

    #[inline]
    pub fn add_dot(&self, idx: u32, delta: f64) {
        atomic_add_f64(&self.dot[idx as usize], delta);
    }

    #[inline]
    pub fn cosine(&self, idx: u32) -> f64 {
        load_f64(&self.cosine[idx as usize], Ordering::Relaxed)
    }

    #[inline]
    pub fn set_cosine(&self, idx: u32, value: f64) {
        store_f64(&self.cosine[idx as usize], value, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.table.reset();
        let live = self.pool.len() as usize;
        for i in 0..live {
            self.word_a[i].store(0, Ordering::Relaxed);
            self.word_b[i].store(0, Ordering::Relaxed);
            self.dot[i].store(0, Ordering::Relaxed);
            self.cosine[i].store(0, Ordering::Relaxed);
        }
        self.pool.reset();
    }

    pub const SENTINEL: u32 = EMPTY_VALUE;
}
