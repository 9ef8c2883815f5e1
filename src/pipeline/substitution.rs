//! Class Substitution (spec §4.8): externally supplied word classes are
//! written onto the Word pool, propagated into the Pair pool (recanonicalizing
//! and eliminating any pair a substitution collapses to a self-pair), the
//! pair index is rebuilt to merge duplicate canonical keys that the
//! substitution created, and Section heads are rewritten to match
//! (connectors are left untouched, per §4.8's rationale that a disjunct's
//! *shape* should survive a class merge even though its head word changes).
//!
//! A word's non-zero class id is used directly as its substitution target —
//! a synthetic word index in a reserved higher range (spec §4.8; confirmed
//! by scenario 8: class map `{10 -> 100, 20 -> 100}` produces the surviving
//! pair `(30, 100)`, the raw class id standing in for a word index with no
//! further lookup). `SubstituteAndRebuild` therefore takes no input beyond
//! what `AssignClasses` already wrote onto the Word pool (spec §6: "none;
//! reads class map"). The host is responsible for choosing class ids that
//! land inside the Word pool's provisioned capacity, the same trust
//! boundary the rest of the engine places on caller-supplied indices (e.g.
//! `CountSentences`'s token indices).

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::atoms::pair::{canonical_key, PairPool};
use crate::atoms::section::SectionPool;
use crate::atoms::word::WordPool;
use crate::config::MIN_LIVE_COUNT;
use crate::hash_table::EMPTY_VALUE;

/// Write `class_ids[i]` onto `word_indices[i]` for every `i` (spec §4.8,
/// `AssignClasses`). A `class_id` of 0 means "unclassified": such a word's
/// substitution is the identity.
pub fn assign_classes(words: &WordPool, word_indices: &[u32], class_ids: &[u32]) {
    word_indices
        .par_iter()
        .zip(class_ids.par_iter())
        .for_each(|(&w, &c)| words.set_class_id(w, c));
}

/// Resolve a word's substitution target: its class id, if classified
/// (spec §4.8: a non-zero class id *is* the synthetic replacement word
/// index, not a lookup key into some other table); itself otherwise.
#[inline]
fn substitute_one(words: &WordPool, word: u32) -> u32 {
    let class = words.class_id(word);
    if class == 0 {
        word
    } else {
        class
    }
}

/// Summary counters returned by [`substitute_pairs`] (spec §6:
/// `SubstitutePairs`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstitutionSummary {
    /// Pairs whose substitution collapsed both endpoints to the same word
    /// (killed in place: count and MI zeroed, dirty flag cleared).
    pub eliminated_self_pairs: u64,
    /// Pairs whose endpoints changed but remained distinct.
    pub recanonicalized: u64,
}

/// Rewrite every live pair's `(word_a, word_b)` through each endpoint's class
/// id, re-sorting into canonical `(lo, hi)` order, killing any pair that
/// collapses to a self-pair, and marking every surviving changed pair dirty
/// so the MI engine recomputes it (spec §4.8, `SubstitutePairs`).
///
/// An eliminated self-pair gets its count and MI zeroed and its dirty flag
/// *cleared* (spec §4.8: "count and MI zeroed, flag cleared") — it is dead,
/// not pending recomputation.
pub fn substitute_pairs(pairs: &PairPool, words: &WordPool, num_pairs: u32) -> SubstitutionSummary {
    let eliminated = AtomicU64::new(0);
    let recanonicalized = AtomicU64::new(0);

    (0..num_pairs).into_par_iter().for_each(|p| {
        if pairs.count(p) < MIN_LIVE_COUNT {
            return;
        }
        let a = pairs.word_a(p);
        let b = pairs.word_b(p);
        let sub_a = substitute_one(words, a);
        let sub_b = substitute_one(words, b);
        if sub_a == a && sub_b == b {
            return;
        }
        if sub_a == sub_b {
            pairs.set_count(p, 0.0);
            pairs.set_mi(p, 0.0);
            pairs.set_dirty(p, false);
            eliminated.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let (lo, hi) = if sub_a <= sub_b { (sub_a, sub_b) } else { (sub_b, sub_a) };
        pairs.set_words(p, lo, hi);
        pairs.set_dirty(p, true);
        recanonicalized.fetch_add(1, Ordering::Relaxed);
    });

    SubstitutionSummary {
        eliminated_self_pairs: eliminated.load(Ordering::Relaxed),
        recanonicalized: recanonicalized.load(Ordering::Relaxed),
    }
}

/// Summary counters returned by [`rebuild_pair_index`] (spec §6:
/// `RebuildPairIndex`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildSummary {
    /// Non-primary pairs merged into an earlier primary with the same
    /// post-substitution canonical key.
    pub merged: u64,
}

/// Rebuild the Pair pool's hash-table index from the (possibly now
/// colliding) `(word_a, word_b)` columns left by [`substitute_pairs`].
///
/// The caller (the session orchestrator) must reset the pool's hash table
/// before calling this, so every live pair gets a fresh claim on its
/// post-substitution key instead of finding its own stale slot.
///
/// For each live pair, the first worker to claim a slot for its
/// post-substitution canonical key becomes that key's primary; every later
/// worker that finds the slot already claimed merges its count into the
/// primary's and is itself killed (spec §4.8, `RebuildPairIndex`: "CAS-claim
/// primary, merge non-primaries"). The primary's count just changed, so it
/// is marked dirty; the non-primary zeroes its own count/MI and clears its
/// own flag, exactly as spec §4.8 assigns the two roles.
pub fn rebuild_pair_index(pairs: &PairPool, num_pairs: u32) -> RebuildSummary {
    let merged = AtomicU64::new(0);

    (0..num_pairs).into_par_iter().for_each(|p| {
        if pairs.count(p) < MIN_LIVE_COUNT {
            return;
        }
        let key = canonical_key(pairs.word_a(p), pairs.word_b(p));
        match pairs.table().claim_or_find(key) {
            Ok((slot, true)) => {
                pairs.table().publish_at(slot, p);
            }
            Ok((slot, false)) => {
                let primary = pairs.table().wait_for_publish(slot);
                if primary != EMPTY_VALUE && primary != p {
                    pairs.add_count(primary, pairs.count(p));
                    pairs.set_dirty(primary, true);
                    pairs.set_count(p, 0.0);
                    pairs.set_mi(p, 0.0);
                    pairs.set_dirty(p, false);
                    merged.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(_) => {}
        }
    });

    RebuildSummary {
        merged: merged.load(Ordering::Relaxed),
    }
}

/// Rewrite every live section's head word through its class id. The
/// disjunct (connector set) is left as-is: §4.8's rationale is that a
/// disjunct describes grammatical shape, not identity, so a class merge
/// should not need to touch it (spec §4.8, `SubstituteSectionWords`).
pub fn substitute_section_words(sections: &SectionPool, words: &WordPool, num_sections: u32) {
    (0..num_sections).into_par_iter().for_each(|s| {
        if sections.count(s) < MIN_LIVE_COUNT {
            return;
        }
        let head = sections.head_word(s);
        let sub = substitute_one(words, head);
        if sub != head {
            sections.set_head_word(s, sub);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_classes_writes_class_id() {
        let words = WordPool::new(64, 32, 16);
        let w = words.find_or_create(&[1, 2, 3]);
        assign_classes(&words, &w, &[5, 5, 0]);
        assert_eq!(words.class_id(w[0]), 5);
        assert_eq!(words.class_id(w[1]), 5);
        assert_eq!(words.class_id(w[2]), 0);
    }

    #[test]
    fn substitution_merge_scenario() {
        // spec §8 scenario 8: words (10, 30, count 5) and (20, 30, count 3)
        // with class map {10 -> 100, 20 -> 100}: after substitute-and-rebuild,
        // exactly one live pair (30, 100) with count 8 remains. The class id
        // 100 is used directly as the synthetic replacement word index, with
        // no separate representative lookup.
        let pairs = PairPool::new(64, 32, 16);
        let words = WordPool::new(256, 128, 16);
        words.set_class_id(10, 100);
        words.set_class_id(20, 100);

        let p1030 = pairs.find_or_create_one(10, 30);
        pairs.add_count(p1030, 5.0);
        let p2030 = pairs.find_or_create_one(20, 30);
        pairs.add_count(p2030, 3.0);

        let summary = substitute_pairs(&pairs, &words, pairs.len());
        assert_eq!(summary.eliminated_self_pairs, 0);
        assert_eq!(summary.recanonicalized, 2);

        pairs.table().reset();
        let rebuild = rebuild_pair_index(&pairs, pairs.len());
        assert_eq!(rebuild.merged, 1);

        let survivors: Vec<u32> = [p1030, p2030].into_iter().filter(|&p| pairs.count(p) > 0.0).collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(pairs.count(survivors[0]), 8.0);
        assert_eq!((pairs.word_a(survivors[0]), pairs.word_b(survivors[0])), (30, 100));
        assert!(pairs.is_dirty(survivors[0]), "primary's count changed, so its flag must be set");

        let dead = [p1030, p2030].into_iter().find(|&p| pairs.count(p) == 0.0).unwrap();
        assert_eq!(pairs.mi(dead), 0.0, "merged-away non-primary's MI must be zeroed");
        assert!(!pairs.is_dirty(dead), "merged-away non-primary's flag must be cleared");
    }

    #[test]
    fn self_pair_elimination_clears_count_mi_and_dirty() {
        // spec §4.8: a pair whose substitution collapses both endpoints to
        // the same word is killed in place with "count and MI zeroed, flag
        // cleared" -- not left dirty, since there is nothing left to recompute.
        let pairs = PairPool::new(64, 32, 16);
        let words = WordPool::new(64, 32, 16);
        words.set_class_id(1, 50);
        words.set_class_id(2, 50);

        let p = pairs.find_or_create_one(1, 2);
        pairs.add_count(p, 4.0);
        pairs.set_mi(p, 3.0);
        pairs.set_dirty(p, true);

        let summary = substitute_pairs(&pairs, &words, pairs.len());
        assert_eq!(summary.eliminated_self_pairs, 1);
        assert_eq!(pairs.count(p), 0.0);
        assert_eq!(pairs.mi(p), 0.0);
        assert!(!pairs.is_dirty(p));
    }

    #[test]
    fn identity_class_map_leaves_pairs_unchanged() {
        let pairs = PairPool::new(64, 32, 16);
        let words = WordPool::new(64, 32, 16);
        let w = words.find_or_create(&[1, 2]);
        let p = pairs.find_or_create_one(w[0], w[1]);
        pairs.add_count(p, 3.0);
        pairs.set_dirty(p, false);

        let summary = substitute_pairs(&pairs, &words, pairs.len());
        assert_eq!(summary.eliminated_self_pairs, 0);
        assert_eq!(summary.recanonicalized, 0);
        assert_eq!(pairs.count(p), 3.0);
        assert!(!pairs.is_dirty(p));
    }

    #[test]
    fn substitute_section_words_rewrites_head_only() {
        let sections = SectionPool::new(64, 32, 16);
        let words = WordPool::new(64, 32, 16);
        words.set_class_id(1, 7);
        let s = sections.find_or_create_one(1, 555);
        sections.add_count(s, 2.0);

        substitute_section_words(&sections, &words, sections.len());
        assert_eq!(sections.head_word(s), 7);
        assert_eq!(sections.disjunct_hash(s), 555, "connectors untouched");
    }
}
