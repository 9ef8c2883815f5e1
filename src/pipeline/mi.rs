//! MI Engine (spec §4.6): per-pair mutual information from counts and
//! marginals, with incremental dirty-only recompute, stats, and a
//! threshold filter.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::atoms::pair::PairPool;
use crate::atoms::word::WordPool;
use crate::config::{DENOMINATOR_EPSILON, MIN_LIVE_COUNT};

/// `log2(count(a,b) * N / (count(a,*) * count(*,b)))`, with each marginal
/// factor floored by [`DENOMINATOR_EPSILON`] to avoid a divide-by-zero-like
/// blowup when a marginal is transiently zero (spec §4.6).
#[inline]
fn mutual_information(pair_count: f64, marginal_a: f64, marginal_b: f64, total_events: f64) -> f64 {
    let denom = (marginal_a.max(DENOMINATOR_EPSILON)) * (marginal_b.max(DENOMINATOR_EPSILON));
    let ratio = (pair_count * total_events) / denom;
    ratio.ln() * std::f64::consts::LOG2_E
}

/// Which pairs a MI computation pass should touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every pair in `0..num_pairs` (spec §4.6, `ComputeAll`).
    All,
    /// Only pairs whose dirty flag is set (spec §4.6, `ComputeDirty`).
    DirtyOnly,
}

/// Recompute MI for `num_pairs` pairs under `mode` (spec §6: `ComputeMI`).
///
/// Pairs whose count is below [`MIN_LIVE_COUNT`] receive `MI = 0` and (in
/// `DirtyOnly` mode) have their dirty flag cleared without further
/// recomputation. `ComputeDirty` clears the dirty flag on every pair it
/// touches, whether or not the count test passes.
pub fn compute_mi(pairs: &PairPool, words: &WordPool, num_pairs: u32, total_events: f64, mode: Mode) {
    (0..num_pairs).into_par_iter().for_each(|idx| {
        if mode == Mode::DirtyOnly && !pairs.is_dirty(idx) {
            return;
        }
        let count = pairs.count(idx);
        if count < MIN_LIVE_COUNT {
            pairs.set_mi(idx, 0.0);
            if mode == Mode::DirtyOnly {
                pairs.set_dirty(idx, false);
            }
            return;
        }
        let a = pairs.word_a(idx);
        let b = pairs.word_b(idx);
        let marginal_a = words.count(a);
        let marginal_b = words.count(b);
        let mi = mutual_information(count, marginal_a, marginal_b, total_events);
        pairs.set_mi(idx, mi);
        if mode == Mode::DirtyOnly {
            pairs.set_dirty(idx, false);
        }
    });
}

/// Aggregate counters returned by [`mi_stats`] (spec §6: `MIStats`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MiStats {
    pub pairs_with_count: u64,
    pub pairs_with_positive_mi: u64,
    pub pairs_above_threshold: u64,
}

/// One worker per pair: tally live pairs, pairs with positive MI, and pairs
/// whose MI exceeds `threshold` (spec §4.6, `Stats`).
pub fn mi_stats(pairs: &PairPool, num_pairs: u32, threshold: f64) -> MiStats {
    let with_count = AtomicU64::new(0);
    let positive_mi = AtomicU64::new(0);
    let above_threshold = AtomicU64::new(0);

    (0..num_pairs).into_par_iter().for_each(|idx| {
        if pairs.count(idx) < MIN_LIVE_COUNT {
            return;
        }
        with_count.fetch_add(1, Ordering::Relaxed);
        let mi = pairs.mi(idx);
        if mi > 0.0 {
            positive_mi.fetch_add(1, Ordering::Relaxed);
        }
        if mi > threshold {
            above_threshold.fetch_add(1, Ordering::Relaxed);
        }
    });

    MiStats {
        pairs_with_count: with_count.load(Ordering::Relaxed),
        pairs_with_positive_mi: positive_mi.load(Ordering::Relaxed),
        pairs_above_threshold: above_threshold.load(Ordering::Relaxed),
    }
}

/// Compact `(pair_index, mi)` for every pair passing both the count (> 0.5)
/// and MI (> threshold) tests, capped at `max_output` (spec §4.6, `Filter`).
pub fn mi_filter(pairs: &PairPool, num_pairs: u32, threshold: f64, max_output: u32) -> Vec<(u32, f64)> {
    let out_count = AtomicU32::new(0);
    let mut out: Vec<(u32, f64)> = (0..max_output).map(|_| (0u32, 0.0)).collect();

    (0..num_pairs).into_par_iter().for_each(|idx| {
        if pairs.count(idx) < MIN_LIVE_COUNT {
            return;
        }
        let mi = pairs.mi(idx);
        if mi <= threshold {
            return;
        }
        let slot = out_count.fetch_add(1, Ordering::Relaxed);
        if slot < max_output {
            // SAFETY-free: each worker claims a disjoint slot via the
            // atomic counter above, so concurrent writes never alias.
            let out_ptr = out.as_ptr() as *mut (u32, f64);
            unsafe {
                *out_ptr.add(slot as usize) = (idx, mi);
            }
        }
    });

    let len = out_count.load(Ordering::Relaxed).min(max_output) as usize;
    out.truncate(len);
    out
}
