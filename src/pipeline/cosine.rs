//! Cosine Engine (spec §4.7): word-pair similarity over shared disjuncts,
//! run as five fenced stages — `ComputeWordNorms`, `BuildDisjunctChains`,
//! `AccumulateDotProducts`, `ComputeCosines`, `FilterCandidates`.
//!
//! A word's implicit vector is its sections' counts, one dimension per
//! disjunct it was ever observed with. Rather than materialize that O(W^2)
//! dense matrix, two sections with the same disjunct hash are linked into a
//! reverse-index chain (step 2); step 3 walks each section's chain to find
//! every other word sharing that dimension and accumulates the dot-product
//! contribution directly into a transient [`crate::atoms::candidate::CandidatePool`]
//! entry.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::atoms::candidate::CandidatePool;
use crate::atoms::section::SectionPool;
use crate::atoms::word::WordPool;
use crate::config::{DENOMINATOR_EPSILON, MIN_LIVE_COUNT};
use crate::diagnostics::Diagnostics;
use crate::hash_table::{HashTable, EMPTY_VALUE};

/// Reverse index from disjunct hash to the section that is the current head
/// of that disjunct's chain (spec §4.7, `BuildDisjunctChains`).
pub struct DisjunctIndex {
    table: HashTable,
}

impl DisjunctIndex {
    pub fn new(table_capacity: u32, probe_limit: u32) -> Self {
        Self {
            table: HashTable::new(table_capacity as usize, probe_limit, false),
        }
    }

    pub fn reset(&self) {
        self.table.reset();
    }
}

/// Zero every word's norm accumulator, then re-derive it from scratch:
/// `norm_squared(w) = sum over live sections headed by w of count(s)^2`
/// (spec §4.7, `ComputeWordNorms`).
pub fn compute_word_norms(sections: &SectionPool, words: &WordPool, num_sections: u32, num_words: u32) {
    (0..num_words).into_par_iter().for_each(|w| {
        words.reset_norm_squared(w);
    });
    (0..num_sections).into_par_iter().for_each(|s| {
        let count = sections.count(s);
        if count < MIN_LIVE_COUNT {
            return;
        }
        let head = sections.head_word(s);
        words.add_norm_squared(head, count * count);
    });
}

/// Prepend every live section onto its disjunct's chain via an atomic
/// exchange on the reverse index (spec §4.7, `BuildDisjunctChains`). Each
/// section's `next_in_chain` becomes whatever section previously occupied
/// the chain head for that disjunct; the index itself always points at the
/// most recently spliced section.
pub fn build_disjunct_chains(sections: &SectionPool, index: &DisjunctIndex, num_sections: u32) {
    (0..num_sections).into_par_iter().for_each(|s| {
        if sections.count(s) < MIN_LIVE_COUNT {
            return;
        }
        let disjunct = sections.disjunct_hash(s);
        let prior_head = index.table.claim_and_exchange(disjunct, s).unwrap_or(EMPTY_VALUE);
        sections.splice_into_chain(s, prior_head);
    });
}

/// For every live section, first measure its disjunct's full chain length;
/// if it exceeds `max_chain_len`, the section contributes nothing at all
/// (spec §4.7, step 3: "if length exceeds a configurable maximum ...  self
/// returns without contributing"). Otherwise walk the chain a second time
/// and, for each distinct other word found there with a strictly larger
/// index, add `count(s) * count(other)` to that word pair's candidate dot
/// product (spec §4.7, `AccumulateDotProducts`).
///
/// This is deliberately a two-phase walk rather than a single bounded one:
/// stopping a single walk early at `max_chain_len` hops would still
/// accumulate a partial, prepend-order-dependent dot product for chains
/// over the cap, instead of the spec's all-or-nothing suppression of
/// uninformative high-frequency disjuncts.
///
/// The `head_word(other) > head_word(s)` guard is what keeps a shared
/// disjunct from contributing twice to the same candidate: the chain walk
/// from `s` and the chain walk from `other` would otherwise both find each
/// other and double the accumulation.
pub fn accumulate_dot_products(
    sections: &SectionPool,
    index: &DisjunctIndex,
    candidates: &CandidatePool,
    num_sections: u32,
    max_chain_len: u32,
    diagnostics: &Diagnostics,
) {
    (0..num_sections).into_par_iter().for_each(|s| {
        let count_s = sections.count(s);
        if count_s < MIN_LIVE_COUNT {
            return;
        }
        let head_s = sections.head_word(s);
        let disjunct = sections.disjunct_hash(s);
        let Ok(chain_head) = index.table.lookup(disjunct) else {
            return;
        };

        let mut length = 0u32;
        let mut cursor = chain_head;
        while cursor != EMPTY_VALUE {
            length += 1;
            cursor = sections.next_in_chain(cursor);
        }
        diagnostics.record_chain_len(length);
        if length > max_chain_len {
            return;
        }

        let mut cursor = chain_head;
        while cursor != EMPTY_VALUE {
            if cursor != s {
                let head_other = sections.head_word(cursor);
                let count_other = sections.count(cursor);
                if head_other > head_s && count_other >= MIN_LIVE_COUNT {
                    let candidate_idx = candidates.find_or_create_one(head_s, head_other);
                    if candidate_idx != EMPTY_VALUE {
                        candidates.add_dot(candidate_idx, count_s * count_other);
                    }
                }
            }
            cursor = sections.next_in_chain(cursor);
        }
    });
}

/// Finalize every candidate's cosine similarity from its accumulated dot
/// product and the two words' norms, clamped to `[-1, 1]` (spec §4.7,
/// `ComputeCosines`).
///
/// When `rare_word_filter` is `true` (the default), a word whose squared
/// norm is below `min_norm_sq` contributes a cosine of exactly 0 rather
/// than an unstable ratio (Open Question (c)); when `false`, the floor
/// check is skipped entirely and only the denominator-epsilon floor
/// applies.
pub fn compute_cosines(candidates: &CandidatePool, words: &WordPool, num_candidates: u32, min_norm_sq: f64, rare_word_filter: bool) {
    (0..num_candidates).into_par_iter().for_each(|idx| {
        let a = candidates.word_a(idx);
        let b = candidates.word_b(idx);
        let norm_a = words.norm_squared(a);
        let norm_b = words.norm_squared(b);
        if rare_word_filter && (norm_a < min_norm_sq || norm_b < min_norm_sq) {
            candidates.set_cosine(idx, 0.0);
            return;
        }
        let denom = (norm_a * norm_b).max(DENOMINATOR_EPSILON).sqrt();
        let cosine = (candidates.dot(idx) / denom).clamp(-1.0, 1.0);
        candidates.set_cosine(idx, cosine);
    });
}

/// Compact `(candidate_index, cosine)` for every candidate whose cosine
/// exceeds `threshold`, capped at `max_output` (spec §4.7, `FilterCandidates`).
pub fn filter_candidates(candidates: &CandidatePool, num_candidates: u32, threshold: f64, max_output: u32) -> Vec<(u32, f64)> {
    let out_count = AtomicU32::new(0);
    let mut out: Vec<(u32, f64)> = (0..max_output).map(|_| (0u32, 0.0)).collect();

    (0..num_candidates).into_par_iter().for_each(|idx| {
        let cosine = candidates.cosine(idx);
        if cosine <= threshold {
            return;
        }
        let slot = out_count.fetch_add(1, Ordering::Relaxed);
        if slot < max_output {
            let out_ptr = out.as_ptr() as *mut (u32, f64);
            unsafe {
                *out_ptr.add(slot as usize) = (idx, cosine);
            }
        }
    });

    let len = out_count.load(Ordering::Relaxed).min(max_output) as usize;
    out.truncate(len);
    out
}
