//! Section Extractor (spec §4.5): builds per-token connector sets from
//! parse edges, sorts them into a canonical disjunct, hashes them, and
//! inserts the result into the Section pool.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::atoms::section::SectionPool;
use crate::error::{EngineError, EngineResult};
use crate::hash_table::{EMPTY_KEY, EMPTY_VALUE};
use crate::pipeline::SentenceBatch;

/// Edge list for a sentence batch: each edge connects two intra-sentence
/// token positions; direction is inferred from the position comparison.
pub struct EdgeBatch<'a> {
    pub edge_p1: &'a [u32],
    pub edge_p2: &'a [u32],
    pub edge_offsets: &'a [u32],
    pub edge_counts: &'a [u32],
}

impl<'a> EdgeBatch<'a> {
    pub fn new(
        edge_p1: &'a [u32],
        edge_p2: &'a [u32],
        edge_offsets: &'a [u32],
        edge_counts: &'a [u32],
        num_sentences: usize,
    ) -> EngineResult<Self> {
        if edge_p1.len() != edge_p2.len() {
            return Err(EngineError::InputMalformed(format!(
                "edge_p1.len() ({}) != edge_p2.len() ({})",
                edge_p1.len(),
                edge_p2.len()
            )));
        }
        if edge_offsets.len() != num_sentences || edge_counts.len() != num_sentences {
            return Err(EngineError::InputMalformed(
                "edge_offsets/edge_counts must have one entry per sentence".into(),
            ));
        }
        let total_edges = edge_p1.len() as u64;
        for (s, (&off, &cnt)) in edge_offsets.iter().zip(edge_counts.iter()).enumerate() {
            if off as u64 + cnt as u64 > total_edges {
                return Err(EngineError::InputMalformed(format!(
                    "sentence {s}: edge range [{off}, {off}+{cnt}) exceeds {total_edges} edges"
                )));
            }
        }
        Ok(Self {
            edge_p1,
            edge_p2,
            edge_offsets,
            edge_counts,
        })
    }
}

/// Summary counters returned by [`extract_sections`] (spec §6: `ExtractSections`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionSummary {
    /// Number of sections created for the first time by this batch.
    pub new_sections: u64,
    /// Connectors beyond `max_connectors_per_token` that were silently
    /// dropped (Open Question (a): surfaced as a diagnostics counter, not
    /// an error).
    pub dropped_connectors: u64,
}

/// A single connector: `(partner_word_index, direction_bit)`.
/// `direction_bit` is 0 for "left" (partner position < self position) and
/// 1 for "right" (spec §4.5, step 1 of sort order).
#[derive(Clone, Copy, PartialEq, Eq)]
struct Connector {
    partner_word: u32,
    direction: u8,
}

/// Insertion-sort connectors by (direction ascending, partner word index
/// ascending) — adequate given the small typical connector count (spec
/// §4.5, step 4).
fn sort_connectors(connectors: &mut [Connector]) {
    for i in 1..connectors.len() {
        let mut j = i;
        while j > 0
            && (connectors[j - 1].direction, connectors[j - 1].partner_word)
                > (connectors[j].direction, connectors[j].partner_word)
        {
            connectors.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// FNV-1a over the sorted connector sequence, each connector encoded as
/// `(partner << 1) | direction` (spec §4.5, step 5). Remapped to 0 if it
/// would collide with the `EMPTY_KEY` sentinel.
fn fnv1a_disjunct_hash(connectors: &[Connector]) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET_BASIS;
    for c in connectors {
        let encoded = ((c.partner_word as u64) << 1) | c.direction as u64;
        for byte in encoded.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    if hash == EMPTY_KEY {
        0
    } else {
        hash
    }
}

/// Maximum connectors collected per token before later ones are silently
/// ignored (design constant; spec §4.5 default 32, caller-configurable via
/// [`crate::config::BuildOptions::max_connectors_per_token`]).
pub fn extract_sections(
    batch: &SentenceBatch<'_>,
    edges: &EdgeBatch<'_>,
    max_connectors_per_token: u32,
    sections: &SectionPool,
) -> EngineResult<ExtractionSummary> {
    let max_connectors = max_connectors_per_token as usize;
    let new_sections = AtomicU64::new(0);
    let dropped_connectors = AtomicU64::new(0);

    (0..batch.total_tokens() as u32)
        .into_par_iter()
        .for_each(|t| {
            let Some((s, _pos)) = batch.locate(t) else {
                return;
            };
            let edge_start = edges.edge_offsets[s] as usize;
            let edge_end = edge_start + edges.edge_counts[s] as usize;

            let mut connectors: Vec<Connector> = Vec::with_capacity(max_connectors.min(8));
            let mut dropped_here = 0u64;
            for e in edge_start..edge_end {
                let (p1, p2) = (edges.edge_p1[e], edges.edge_p2[e]);
                let partner_pos = if p1 == t {
                    Some(p2)
                } else if p2 == t {
                    Some(p1)
                } else {
                    None
                };
                let Some(partner_pos) = partner_pos else {
                    continue;
                };
                if connectors.len() >= max_connectors {
                    dropped_here += 1;
                    continue;
                }
                let direction = if partner_pos < t { 0 } else { 1 };
                let partner_word = batch.flat_tokens[partner_pos as usize];
                connectors.push(Connector {
                    partner_word,
                    direction,
                });
            }
            if dropped_here > 0 {
                dropped_connectors.fetch_add(dropped_here, Ordering::Relaxed);
            }
            if connectors.is_empty() {
                return;
            }

            sort_connectors(&mut connectors);
            let disjunct_hash = fnv1a_disjunct_hash(&connectors);
            let head_word = batch.flat_tokens[t as usize];

            let (section_idx, created) =
                sections.find_or_create_one_tracked(head_word, disjunct_hash);
            if section_idx == EMPTY_VALUE {
                return;
            }
            if created {
                new_sections.fetch_add(1, Ordering::Relaxed);
            }
            sections.add_count(section_idx, 1.0);
        });

    Ok(ExtractionSummary {
        new_sections: new_sections.load(Ordering::Relaxed),
        dropped_connectors: dropped_connectors.load(Ordering::Relaxed),
    })
}
