//! Counting Pipeline (spec §4.4): sliding-window pair enumeration and
//! atomic count accumulation over a sentence batch.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::atoms::pair::PairPool;
use crate::atoms::word::WordPool;
use crate::error::EngineResult;
use crate::pipeline::SentenceBatch;

/// Summary counters returned by [`count_sentences`] (spec §6: `CountSentences`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingSummary {
    /// Number of pairs created for the first time by this batch.
    pub new_pairs: u64,
    /// Number of (token, token) co-occurrences counted (i.e. the number of
    /// times a pair's count was incremented, including repeats of existing
    /// pairs).
    pub new_events: u64,
}

/// Run the counting pipeline over `batch` with the given `window`, updating
/// `pairs` (new pairs, incremented counts, dirty flags) and `words`
/// (marginals), and returning a summary (spec §6).
///
/// `window` of 0 is treated as 1 (a window must cover at least the
/// immediate neighbor); sentences of length <= 1 produce no pairs, and a
/// window larger than a sentence is silently clamped (spec §4.4, edge
/// cases).
pub fn count_sentences(
    batch: &SentenceBatch<'_>,
    window: u32,
    pairs: &PairPool,
    words: &WordPool,
) -> EngineResult<CountingSummary> {
    let window = window.max(1);
    let new_pairs = AtomicU64::new(0);
    let new_events = AtomicU64::new(0);

    (0..batch.total_tokens() as u32)
        .into_par_iter()
        .for_each(|t| {
            let Some((s, pos_in_sentence)) = batch.locate(t) else {
                return;
            };
            let length = batch.lengths[s];
            if length <= 1 {
                return;
            }
            let max_j = window.min(length - 1 - pos_in_sentence);
            for j in 1..=max_j {
                let t2 = t + j;
                let tok_a = batch.flat_tokens[t as usize];
                let tok_b = batch.flat_tokens[t2 as usize];
                if tok_a == tok_b {
                    continue;
                }
                let (pair_idx, created) = pairs.find_or_create_one_tracked(tok_a, tok_b);
                if pair_idx == crate::hash_table::EMPTY_VALUE {
                    continue;
                }
                if created {
                    new_pairs.fetch_add(1, Ordering::Relaxed);
                }
                pairs.add_count(pair_idx, 1.0);
                words.add_count(tok_a, 1.0);
                words.add_count(tok_b, 1.0);
                pairs.set_dirty(pair_idx, true);
                new_events.fetch_add(1, Ordering::Relaxed);
            }
        });

    Ok(CountingSummary {
        new_pairs: new_pairs.load(Ordering::Relaxed),
        new_events: new_events.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> (PairPool, WordPool) {
        (
            PairPool::new(1024, 512, 32),
            WordPool::new(1024, 512, 32),
        )
    }

    #[test]
    fn counting_a_chain_scenario() {
        // spec §8 scenario 3.
        let (pairs, words) = pools();
        let flat = [0u32, 1, 2, 3];
        let offsets = [0u32];
        let lengths = [4u32];
        let batch = SentenceBatch::new(&flat, &offsets, &lengths).unwrap();
        // Pre-create word entries at the exact indices used as tokens so
        // marginals land on the right SoA slots.
        words.find_or_create(&[0, 1, 2, 3]);

        let summary = count_sentences(&batch, 2, &pairs, &words).unwrap();
        assert_eq!(summary.new_pairs, 5);
        assert_eq!(summary.new_events, 5);
        assert_eq!(pairs.len(), 5);

        let expected_marginals = [2.0, 3.0, 3.0, 2.0];
        for (w, &expected) in expected_marginals.iter().enumerate() {
            assert_eq!(words.count(w as u32), expected, "word {w}");
        }

        for (a, b) in [(0u32, 1u32), (0, 2), (1, 2), (1, 3), (2, 3)] {
            let idx = pairs.find_or_create_one(a, b);
            assert_eq!(pairs.count(idx), 1.0, "pair ({a},{b})");
        }
    }

    #[test]
    fn multi_sentence_boundary_scenario() {
        // spec §8 scenario 4.
        let (pairs, words) = pools();
        words.find_or_create(&(0..7).collect::<Vec<_>>());
        let flat = [0u32, 1, 2, 3, 4, 5, 6];
        let offsets = [0u32, 4];
        let lengths = [4u32, 3];
        let batch = SentenceBatch::new(&flat, &offsets, &lengths).unwrap();

        let summary = count_sentences(&batch, 2, &pairs, &words).unwrap();
        assert_eq!(summary.new_pairs, 8);
        assert_eq!(pairs.len(), 8);

        // No pair spans the sentence boundary: looking one up now creates
        // it fresh, with count still at zero.
        let boundary_idx = pairs.find_or_create_one(3, 4);
        assert_eq!(pairs.count(boundary_idx), 0.0);
    }

    #[test]
    fn sentence_of_length_one_produces_no_pairs() {
        let (pairs, words) = pools();
        words.find_or_create(&[0]);
        let flat = [0u32];
        let offsets = [0u32];
        let lengths = [1u32];
        let batch = SentenceBatch::new(&flat, &offsets, &lengths).unwrap();
        let summary = count_sentences(&batch, 2, &pairs, &words).unwrap();
        assert_eq!(summary.new_pairs, 0);
        assert_eq!(summary.new_events, 0);
    }

    #[test]
    fn self_pairs_are_skipped() {
        let (pairs, words) = pools();
        words.find_or_create(&[5]);
        let flat = [5u32, 5, 5];
        let offsets = [0u32];
        let lengths = [3u32];
        let batch = SentenceBatch::new(&flat, &offsets, &lengths).unwrap();
        let summary = count_sentences(&batch, 2, &pairs, &words).unwrap();
        assert_eq!(summary.new_pairs, 0);
        assert_eq!(summary.new_events, 0);
        assert_eq!(pairs.len(), 0);
    }

    #[test]
    fn window_larger_than_sentence_is_clamped() {
        let (pairs, words) = pools();
        words.find_or_create(&[0, 1, 2]);
        let flat = [0u32, 1, 2];
        let offsets = [0u32];
        let lengths = [3u32];
        let batch = SentenceBatch::new(&flat, &offsets, &lengths).unwrap();
        let summary = count_sentences(&batch, 100, &pairs, &words).unwrap();
        // Only (0,1), (0,2), (1,2) are possible within a 3-token sentence.
        assert_eq!(summary.new_pairs, 3);
    }

    #[test]
    fn counting_twice_doubles_every_count() {
        let (pairs, words) = pools();
        words.find_or_create(&[0, 1, 2, 3]);
        let flat = [0u32, 1, 2, 3];
        let offsets = [0u32];
        let lengths = [4u32];
        let batch = SentenceBatch::new(&flat, &offsets, &lengths).unwrap();
        count_sentences(&batch, 2, &pairs, &words).unwrap();
        count_sentences(&batch, 2, &pairs, &words).unwrap();
        for (a, b) in [(0u32, 1u32), (0, 2), (1, 2), (1, 3), (2, 3)] {
            let idx = pairs.find_or_create_one(a, b);
            assert_eq!(pairs.count(idx), 2.0);
        }
        for (w, expected) in [(0, 4.0), (1, 6.0), (2, 6.0), (3, 4.0)] {
            assert_eq!(words.count(w), expected);
        }
    }
}
