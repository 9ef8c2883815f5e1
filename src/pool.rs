//! SoA pool allocator (spec §4.2).
//!
//! A pool is a bump-allocated struct-of-arrays region plus a single
//! `AtomicU32 next_free` counter. There is no per-entry metadata; the array
//! index *is* the entry's identity, and entries are never individually
//! freed during normal operation (session reset rewinds the whole pool at
//! once). Allocation order is bump -> zero-init -> fence -> publish, so
//! that a reader who observes a live index through the owning hash table
//! never sees a partially-initialized entry.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::hash_table::EMPTY_VALUE;

/// A fixed-capacity bump allocator. Entity-specific SoA arrays are stored
/// alongside this in each atom pool's struct; `Pool` itself only owns the
/// capacity and the bump counter.
pub struct Pool {
    next_free: AtomicU32,
    capacity: u32,
}

impl Pool {
    pub fn new(capacity: u32) -> Self {
        Self {
            next_free: AtomicU32::new(0),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of entries allocated so far. Monotonically non-decreasing for
    /// the session's lifetime (spec §3, invariant 7).
    #[inline]
    pub fn len(&self) -> u32 {
        self.next_free.load(Ordering::Acquire).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bump-allocate one entry. Returns `EMPTY_VALUE` if the pool is
    /// exhausted (spec §4.3: "pool exhaustion is a design error; the engine
    /// reports it in readback statistics but does not abort").
    #[inline]
    pub fn allocate(&self) -> u32 {
        let idx = self.next_free.fetch_add(1, Ordering::AcqRel);
        if idx >= self.capacity {
            EMPTY_VALUE
        } else {
            idx
        }
    }

    /// Rewind the bump pointer to zero. Callers are responsible for
    /// zeroing their own SoA arrays (the pool itself owns no payload).
    pub fn reset(&self) {
        self.next_free.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_bumps_sequentially() {
        let p = Pool::new(4);
        assert_eq!(p.allocate(), 0);
        assert_eq!(p.allocate(), 1);
        assert_eq!(p.allocate(), 2);
        assert_eq!(p.allocate(), 3);
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn exhaustion_returns_sentinel() {
        let p = Pool::new(1);
        assert_eq!(p.allocate(), 0);
        assert_eq!(p.allocate(), EMPTY_VALUE);
    }

    #[test]
    fn reset_rewinds_bump_pointer() {
        let p = Pool::new(4);
        p.allocate();
        p.allocate();
        p.reset();
        assert_eq!(p.len(), 0);
        assert_eq!(p.allocate(), 0);
    }

    #[test]
    fn concurrent_allocate_yields_unique_indices() {
        use std::collections::HashSet;
        use std::sync::Arc;
        let p = Arc::new(Pool::new(10_000));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let p = Arc::clone(&p);
                std::thread::spawn(move || {
                    let mut v = Vec::with_capacity(625);
                    for _ in 0..625 {
                        v.push(p.allocate());
                    }
                    v
                })
            })
            .collect();
        let mut all = HashSet::new();
        for h in handles {
            for idx in h.join().unwrap() {
                assert!(all.insert(idx), "duplicate index {idx}");
            }
        }
        assert_eq!(all.len(), 10_000);
    }
}
