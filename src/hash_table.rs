//! Lock-free, fixed-capacity, open-addressing hash table (spec §4.1).
//!
//! Keys are 64-bit; values are 32-bit. Capacity is a power of two, probing
//! is linear, and the hash function is a splitmix64-style finalizer applied
//! to the key. Two sentinels reserve the all-ones bit pattern: `EMPTY_KEY`
//! for an unclaimed key slot, `EMPTY_VALUE` for an unpublished or
//! tombstoned value slot. Callers must never insert a key equal to
//! `EMPTY_KEY` (spec §6: "use value 0 as a replacement").
//!
//! Every operation here is either wait-free (lookup, delete, the
//! non-contended insert path) or lock-free (a contended insert makes
//! global progress; an individual worker's probe is bounded by
//! [`HashTable::probe_limit`]).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Reserved "empty" key: all 64 bits set.
pub const EMPTY_KEY: u64 = u64::MAX;
/// Reserved "empty"/tombstoned value: all 32 bits set.
pub const EMPTY_VALUE: u32 = u32::MAX;

/// Outcome of a probe that did not find (or could not claim) a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The key was not found before an `EMPTY_KEY` slot was reached.
    Miss,
    /// The probe limit was reached before resolving a slot.
    ProbeExhausted,
    /// No empty slot and no matching key were found before the limit.
    Full,
}

/// splitmix64 finalizer: three xor-shift-multiply rounds.
#[inline]
fn finalize(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    x
}

/// A fixed-capacity lock-free open-addressing map from `u64` to `u32`.
pub struct HashTable {
    keys: Vec<AtomicU64>,
    values: Vec<AtomicU32>,
    capacity: usize,
    mask: u64,
    /// Bounded probe limit shared by every operation on this table.
    probe_limit: u32,
    /// Values are zero-initialized instead of sentinel-initialized; required
    /// by `insert_or_increment` (spec §4.1).
    zero_init_values: bool,
}

impl HashTable {
    /// Create a table of the given power-of-two capacity and probe limit.
    ///
    /// `zero_init_values` must be `true` for tables backing
    /// `insert_or_increment` (the counting-pipeline event table), and
    /// `false` for every atom-pool table (where `EMPTY_VALUE` marks an
    /// unpublished pool index).
    pub fn new(capacity: usize, probe_limit: u32, zero_init_values: bool) -> Self {
        assert!(capacity.is_power_of_two(), "capacity must be a power of two");
        let keys = (0..capacity).map(|_| AtomicU64::new(EMPTY_KEY)).collect();
        let init_value = if zero_init_values { 0 } else { EMPTY_VALUE };
        let values = (0..capacity).map(|_| AtomicU32::new(init_value)).collect();
        Self {
            keys,
            values,
            capacity,
            mask: capacity as u64 - 1,
            probe_limit,
            zero_init_values,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn start_slot(&self, key: u64) -> usize {
        (finalize(key) & self.mask) as usize
    }

    /// Claim a slot for `key`, returning its index. Returns the previous key
    /// observed in the slot that resolved the claim (`EMPTY_KEY` if we won
    /// the CAS ourselves, or `key` if another worker already claimed it).
    /// Returns `Err(ProbeOutcome)` if the probe limit was reached.
    fn claim_slot(&self, key: u64) -> Result<usize, ProbeOutcome> {
        debug_assert_ne!(key, EMPTY_KEY, "callers must never insert the sentinel key");
        let mut slot = self.start_slot(key);
        for _ in 0..self.probe_limit {
            match self.keys[slot].compare_exchange(
                EMPTY_KEY,
                key,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(slot),
                Err(observed) if observed == key => return Ok(slot),
                Err(_) => slot = (slot + 1) & self.mask as usize,
            }
        }
        Err(ProbeOutcome::Full)
    }

    /// Insert `key` with value `v`. If `key` already exists, its value is
    /// overwritten (not merged) — see [`Self::insert_or_increment`] for the
    /// accumulating variant.
    pub fn insert(&self, key: u64, v: u32) -> Result<(), ProbeOutcome> {
        let slot = self.claim_slot(key)?;
        self.values[slot].store(v, Ordering::Release);
        Ok(())
    }

    /// Like [`Self::insert`], but the value slot is atomically incremented
    /// by 1 rather than assigned. Requires the table to have been created
    /// with `zero_init_values = true`.
    pub fn insert_or_increment(&self, key: u64) -> Result<u32, ProbeOutcome> {
        debug_assert!(
            self.zero_init_values,
            "insert_or_increment requires zero-initialized value slots"
        );
        let slot = self.claim_slot(key)?;
        Ok(self.values[slot].fetch_add(1, Ordering::AcqRel))
    }

    /// Find the value published for `key`, spinning briefly if a slot's key
    /// has been claimed but its value has not yet been published (the
    /// duplicate-publication race of spec §4.3/§5). Returns `ProbeOutcome`
    /// on miss or exhaustion.
    pub fn lookup(&self, key: u64) -> Result<u32, ProbeOutcome> {
        let mut slot = self.start_slot(key);
        for _ in 0..self.probe_limit {
            let observed_key = self.keys[slot].load(Ordering::Acquire);
            if observed_key == EMPTY_KEY {
                return Err(ProbeOutcome::Miss);
            }
            if observed_key == key {
                return Ok(self.spin_until_published(slot));
            }
            slot = (slot + 1) & self.mask as usize;
        }
        Err(ProbeOutcome::ProbeExhausted)
    }

    /// Spin (bounded) until the value slot for a freshly-claimed key is
    /// published by its creator. Terminates because the creator publishes
    /// in the order bump -> initialize -> fence -> publish (spec §5).
    fn spin_until_published(&self, slot: usize) -> u32 {
        const SPIN_BOUND: u32 = 1 << 20;
        for _ in 0..SPIN_BOUND {
            let v = self.values[slot].load(Ordering::Acquire);
            if v != EMPTY_VALUE || self.zero_init_values {
                return v;
            }
            std::hint::spin_loop();
        }
        // A well-formed creator always publishes within the spin bound; if
        // we get here the slot's creator is gone (should not happen in
        // practice) — report the sentinel rather than spinning forever.
        EMPTY_VALUE
    }

    /// Probe for `key` and, on a match, tombstone its value to
    /// `EMPTY_VALUE`. The key itself is retained so later probes over the
    /// same chain still succeed (spec §4.1).
    pub fn delete(&self, key: u64) -> Result<(), ProbeOutcome> {
        let mut slot = self.start_slot(key);
        for _ in 0..self.probe_limit {
            let observed_key = self.keys[slot].load(Ordering::Acquire);
            if observed_key == EMPTY_KEY {
                return Err(ProbeOutcome::Miss);
            }
            if observed_key == key {
                self.values[slot].store(EMPTY_VALUE, Ordering::Release);
                return Ok(());
            }
            slot = (slot + 1) & self.mask as usize;
        }
        Err(ProbeOutcome::ProbeExhausted)
    }

    /// Directly publish `value` into the slot that currently holds `key`
    /// (used by atom-pool find-or-create winners to publish a freshly
    /// allocated pool index, and by class substitution's rebuild stage).
    /// The slot must already contain `key` (claimed via [`Self::claim_slot`]
    /// logic); this does not itself probe for the key.
    pub(crate) fn publish_at(&self, slot: usize, value: u32) {
        self.values[slot].store(value, Ordering::Release);
    }

    /// Claim a slot for `key` and report whether the caller won the race
    /// (i.e. observed `EMPTY_KEY`) or lost it (observed `key` already
    /// there). Exposes the slot index so winners can publish after
    /// initializing their payload, and losers can spin for the winner's
    /// publication. This is the primitive atom-pool `FindOrCreate`
    /// implementations build on.
    pub(crate) fn claim_or_find(&self, key: u64) -> Result<(usize, bool), ProbeOutcome> {
        let mut slot = self.start_slot(key);
        for _ in 0..self.probe_limit {
            match self.keys[slot].compare_exchange(
                EMPTY_KEY,
                key,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok((slot, true)),
                Err(observed) if observed == key => return Ok((slot, false)),
                Err(_) => slot = (slot + 1) & self.mask as usize,
            }
        }
        Err(ProbeOutcome::Full)
    }

    pub(crate) fn value_at(&self, slot: usize) -> u32 {
        self.values[slot].load(Ordering::Acquire)
    }

    /// Claim (or find) the slot for `key`, then atomically swap `new_value`
    /// into it and return whatever value was there before. Used by the
    /// cosine engine's `BuildDisjunctChains` stage to prepend onto a
    /// per-disjunct chain without a separate claim/publish handshake: the
    /// table's value slot *is* the chain head, and each worker's swap is
    /// itself the "atomic exchange prepend" spec §4.7 describes.
    pub(crate) fn claim_and_exchange(&self, key: u64, new_value: u32) -> Result<u32, ProbeOutcome> {
        let slot = self.claim_slot(key)?;
        Ok(self.values[slot].swap(new_value, Ordering::AcqRel))
    }

    /// Public wrapper over the bounded spin used to wait for a winner's
    /// publication after losing a [`Self::claim_or_find`] race.
    pub(crate) fn wait_for_publish(&self, slot: usize) -> u32 {
        self.spin_until_published(slot)
    }

    /// Reset every key slot to `EMPTY_KEY` and every value slot to its
    /// initial state (zero or `EMPTY_VALUE` depending on how the table was
    /// constructed). Used by session reset.
    pub fn reset(&self) {
        let init_value = if self.zero_init_values { 0 } else { EMPTY_VALUE };
        for k in &self.keys {
            k.store(EMPTY_KEY, Ordering::Relaxed);
        }
        for v in &self.values {
            v.store(init_value, Ordering::Relaxed);
        }
    }

    /// One worker per slot: collect all non-empty, non-tombstoned (key,
    /// value) pairs. Order is slot order, not insertion order.
    pub fn iterate(&self) -> Vec<(u64, u32)> {
        use rayon::prelude::*;
        (0..self.capacity)
            .into_par_iter()
            .filter_map(|slot| {
                let k = self.keys[slot].load(Ordering::Acquire);
                if k == EMPTY_KEY {
                    return None;
                }
                let v = self.values[slot].load(Ordering::Acquire);
                if v == EMPTY_VALUE && !self.zero_init_values {
                    return None;
                }
                Some((k, v))
            })
            .collect()
    }

    /// Fraction of slots currently holding a non-sentinel key. Diagnostics
    /// only; not used for correctness.
    pub fn load_factor(&self) -> f64 {
        let live = self
            .keys
            .iter()
            .filter(|k| k.load(Ordering::Relaxed) != EMPTY_KEY)
            .count();
        live as f64 / self.capacity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup() {
        let t = HashTable::new(16, 8, false);
        t.insert(42, 7).unwrap();
        assert_eq!(t.lookup(42).unwrap(), 7);
    }

    #[test]
    fn lookup_miss_returns_miss() {
        let t = HashTable::new(16, 8, false);
        assert_eq!(t.lookup(99), Err(ProbeOutcome::Miss));
    }

    #[test]
    fn delete_tombstones_value_but_keeps_key_chain() {
        let t = HashTable::new(16, 8, false);
        t.insert(1, 10).unwrap();
        t.insert(2, 20).unwrap();
        t.delete(1).unwrap();
        assert_eq!(t.lookup(1).unwrap(), EMPTY_VALUE);
        // Chain through slot 1's probe sequence to slot 2 must still work.
        assert_eq!(t.lookup(2).unwrap(), 20);
    }

    #[test]
    fn insert_or_increment_accumulates() {
        let t = HashTable::new(16, 8, true);
        t.insert_or_increment(5).unwrap();
        t.insert_or_increment(5).unwrap();
        t.insert_or_increment(5).unwrap();
        assert_eq!(t.lookup(5).unwrap(), 3);
    }

    #[test]
    fn reset_clears_table() {
        let t = HashTable::new(16, 8, false);
        t.insert(1, 1).unwrap();
        t.reset();
        assert_eq!(t.lookup(1), Err(ProbeOutcome::Miss));
    }

    #[test]
    fn concurrent_claim_or_find_agree_on_winner() {
        use std::sync::Arc;
        let t = Arc::new(HashTable::new(1024, 32, false));
        let key = 0xdead_beefu64;
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let t = Arc::clone(&t);
                std::thread::spawn(move || {
                    let (slot, won) = t.claim_or_find(key).unwrap();
                    if won {
                        t.publish_at(slot, i);
                    }
                    slot
                })
            })
            .collect();
        let slots: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(slots.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn iterate_collects_live_entries() {
        let t = HashTable::new(16, 8, false);
        t.insert(1, 10).unwrap();
        t.insert(2, 20).unwrap();
        t.delete(2).unwrap();
        let mut got = t.iterate();
        got.sort_unstable();
        assert_eq!(got, vec![(1, 10)]);
    }
}
