//! The compute pipeline: counting, section extraction, MI, cosine, and
//! class substitution (spec §4.4–§4.8).
//!
//! Each stage is launched as a `rayon` fork-join over a 1-D index space:
//! workers only read the arrays their stage's contract declares read-only
//! and mutate shared state exclusively through atomics (spec §5). The host
//! (this crate's [`crate::Session`]) inserts an implicit fence between
//! stages simply by waiting for one `par_iter` call to return before
//! issuing the next.

pub mod cosine;
pub mod counting;
pub mod mi;
pub mod sections;
pub mod substitution;

use crate::error::{EngineError, EngineResult};

/// Below this many sentences, a worker locates its own sentence by linear
/// scan; at or above it, by binary search over `offsets` (spec §4.4).
const LINEAR_SCAN_THRESHOLD: usize = 64;

/// A validated view over a sentence batch: `flat_tokens[offsets[s] ..
/// offsets[s] + lengths[s]]` is sentence `s`'s tokens, for every `s`.
pub struct SentenceBatch<'a> {
    pub flat_tokens: &'a [u32],
    pub offsets: &'a [u32],
    pub lengths: &'a [u32],
}

impl<'a> SentenceBatch<'a> {
    /// Validate that offsets/lengths describe a partition of `flat_tokens`
    /// with no overlap and no out-of-bounds span (spec §7:
    /// `InputMalformed`, rejected before any pool is touched).
    pub fn new(
        flat_tokens: &'a [u32],
        offsets: &'a [u32],
        lengths: &'a [u32],
    ) -> EngineResult<Self> {
        if offsets.len() != lengths.len() {
            return Err(EngineError::InputMalformed(format!(
                "offsets.len() ({}) != lengths.len() ({})",
                offsets.len(),
                lengths.len()
            )));
        }
        let total = flat_tokens.len() as u64;
        let mut prev_end = 0u64;
        for (s, (&off, &len)) in offsets.iter().zip(lengths.iter()).enumerate() {
            let off = off as u64;
            let len = len as u64;
            if off < prev_end {
                return Err(EngineError::InputMalformed(format!(
                    "sentence {s} offset {off} overlaps the previous sentence (ends at {prev_end})"
                )));
            }
            if off + len > total {
                return Err(EngineError::InputMalformed(format!(
                    "sentence {s}: offset {off} + length {len} exceeds flat_tokens length {total}"
                )));
            }
            prev_end = off + len;
        }
        Ok(Self {
            flat_tokens,
            offsets,
            lengths,
        })
    }

    #[inline]
    pub fn num_sentences(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn total_tokens(&self) -> usize {
        self.flat_tokens.len()
    }

    /// Locate the sentence containing token position `t`, choosing a
    /// linear scan or a binary search based on the batch's sentence count
    /// (spec §4.4). Returns the sentence index and the token's position
    /// within that sentence.
    pub(crate) fn locate(&self, t: u32) -> Option<(usize, u32)> {
        if self.num_sentences() <= LINEAR_SCAN_THRESHOLD {
            for (s, (&off, &len)) in self.offsets.iter().zip(self.lengths.iter()).enumerate() {
                if t >= off && t < off + len {
                    return Some((s, t - off));
                }
            }
            None
        } else {
            match self.offsets.binary_search(&t) {
                Ok(s) => Some((s, 0)),
                Err(0) => None,
                Err(i) => {
                    let s = i - 1;
                    let off = self.offsets[s];
                    let len = self.lengths[s];
                    if t < off + len {
                        Some((s, t - off))
                    } else {
                        None
                    }
                }
            }
        }
    }
}
