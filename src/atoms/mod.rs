//! Atom pools (spec §4.3): Word, Pair, Section, and the transient Candidate
//! pool used by the cosine engine.
//!
//! The three (four, counting Candidate) atom pools share the same
//! find-or-create algorithm and differ only in key computation and payload
//! layout (Design Notes §9: "implementers should factor the algorithm
//! generically over a capability set"). [`find_or_create`] is that shared
//! core; each pool module supplies its own canonical key and its own
//! payload initializer.

pub mod candidate;
pub mod pair;
pub mod section;
pub mod word;

use std::sync::atomic::{fence, Ordering};

use crate::hash_table::{HashTable, EMPTY_VALUE};
use crate::pool::Pool;

/// Find or create the pool entry for `key`.
///
/// Two workers racing on the same key see the sequence described in spec
/// §4.3: the winner claims the hash-table key slot, bumps the pool counter,
/// runs `init` to populate the new entry's payload, issues a release fence,
/// then publishes the pool index into the value slot. The loser observes a
/// matching key and spins (bounded) until the winner's publication is
/// visible. Both return the same index.
///
/// Returns `EMPTY_VALUE` if the hash table's probe limit is exhausted or
/// the pool itself is full; pool exhaustion after a successful key claim
/// publishes `EMPTY_VALUE` so the call remains idempotent for repeat
/// lookups of the same key.
pub(crate) fn find_or_create(table: &HashTable, pool: &Pool, key: u64, init: impl FnOnce(u32)) -> u32 {
    find_or_create_tracked(table, pool, key, init).0
}

/// Same as [`find_or_create`], but also reports whether this call won the
/// race and created a new entry (used by the counting pipeline and section
/// extractor to report "new pairs"/"new sections" summary counters).
pub(crate) fn find_or_create_tracked(
    table: &HashTable,
    pool: &Pool,
    key: u64,
    init: impl FnOnce(u32),
) -> (u32, bool) {
    match table.claim_or_find(key) {
        Ok((slot, true)) => {
            let idx = pool.allocate();
            if idx == EMPTY_VALUE {
                table.publish_at(slot, EMPTY_VALUE);
                return (EMPTY_VALUE, false);
            }
            init(idx);
            fence(Ordering::Release);
            table.publish_at(slot, idx);
            (idx, true)
        }
        Ok((slot, false)) => (table.wait_for_publish(slot), false),
        Err(_) => (EMPTY_VALUE, false),
    }
}

/// Run `find_or_create` for a batch of keys in parallel, preserving input
/// order in the returned index array (spec §6: `FindOrCreateWords`,
/// `FindOrCreatePairs` operate on whole batches).
pub(crate) fn find_or_create_batch(
    table: &HashTable,
    pool: &Pool,
    keys: &[u64],
    init: impl Fn(u32, u64) + Sync,
) -> Vec<u32> {
    use rayon::prelude::*;
    keys.par_iter()
        .map(|&key| find_or_create(table, pool, key, |idx| init(idx, key)))
        .collect()
}
