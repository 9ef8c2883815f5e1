//! Host Orchestrator (spec §4.9): owns every pool for one engine session,
//! validates [`BuildOptions`] at open, and exposes the batch-command API
//! (spec §6) that chains the compute pipeline's stages without a host
//! round-trip between them.
//!
//! Multiple independent sessions may be open at once: a `Session` owns all
//! of its arrays and carries no process-wide state (Design Notes §9: "a
//! multi-session extension would carry no shared state").

use tracing::{debug, info};

use crate::atoms::candidate::CandidatePool;
use crate::atoms::pair::PairPool;
use crate::atoms::section::SectionPool;
use crate::atoms::word::WordPool;
use crate::config::BuildOptions;
use crate::diagnostics::{self, Diagnostics};
use crate::error::{EngineError, EngineResult};
use crate::pipeline::cosine::{self, DisjunctIndex};
use crate::pipeline::counting::{self, CountingSummary};
use crate::pipeline::mi::{self, MiStats};
use crate::pipeline::sections::{self, EdgeBatch, ExtractionSummary};
use crate::pipeline::substitution::{self, RebuildSummary, SubstitutionSummary};
use crate::pipeline::SentenceBatch;

/// One open engine session: every atom pool, the cosine engine's reverse
/// index, and this session's diagnostics counters (spec §4.9, `OpenSession`).
pub struct Session {
    options: BuildOptions,
    words: WordPool,
    pairs: PairPool,
    sections: SectionPool,
    candidates: CandidatePool,
    disjunct_index: DisjunctIndex,
    diagnostics: Diagnostics,
}

impl Session {
    /// Validate `options` and allocate every pool. Fails fast with
    /// `EngineError::BuildOption` before touching any array (spec §4.9,
    /// Open Question (b)).
    pub fn open(options: BuildOptions) -> EngineResult<Self> {
        options.validate()?;
        info!(
            word_pool = options.word_pool_capacity,
            pair_pool = options.pair_pool_capacity,
            section_pool = options.section_pool_capacity,
            "opening session"
        );
        Ok(Self {
            words: WordPool::new(options.word_table_capacity, options.word_pool_capacity, options.probe_limit),
            pairs: PairPool::new(options.pair_table_capacity, options.pair_pool_capacity, options.probe_limit),
            sections: SectionPool::new(
                options.section_table_capacity,
                options.section_pool_capacity,
                options.probe_limit,
            ),
            candidates: CandidatePool::new(
                options.candidate_table_capacity,
                options.candidate_pool_capacity,
                options.probe_limit,
            ),
            disjunct_index: DisjunctIndex::new(options.disjunct_index_capacity, options.probe_limit),
            diagnostics: Diagnostics::new(),
            options,
        })
    }

    /// Rewind every pool and index to empty, keeping the same capacities
    /// (spec §4.9, per-stage reset primitives). Diagnostics counters are
    /// untouched — they describe the session's lifetime, not its current
    /// contents.
    pub fn reset(&self) {
        self.words.reset();
        self.pairs.reset();
        self.sections.reset();
        self.candidates.reset();
        self.disjunct_index.reset();
    }

    pub fn close(self) {
        info!("closing session");
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn words(&self) -> &WordPool {
        &self.words
    }

    pub fn pairs(&self) -> &PairPool {
        &self.pairs
    }

    pub fn sections(&self) -> &SectionPool {
        &self.sections
    }

    pub fn candidates(&self) -> &CandidatePool {
        &self.candidates
    }

    pub fn diagnostics(&self) -> diagnostics::Snapshot {
        self.diagnostics.snapshot()
    }

    /// Find-or-create the words for a batch of pre-hashed content keys
    /// (spec §6: `FindOrCreateWords`).
    pub fn find_or_create_words(&self, hashes: &[u64]) -> Vec<u32> {
        self.words.find_or_create(hashes)
    }

    /// Run the counting pipeline over one sentence batch (spec §6:
    /// `CountSentences`).
    pub fn count_sentences(
        &self,
        flat_tokens: &[u32],
        offsets: &[u32],
        lengths: &[u32],
        window: u32,
    ) -> EngineResult<CountingSummary> {
        let batch = SentenceBatch::new(flat_tokens, offsets, lengths)?;
        debug!(sentences = batch.num_sentences(), window, "CountSentences");
        let summary = counting::count_sentences(&batch, window, &self.pairs, &self.words)?;
        self.diagnostics.record_pairs_created(summary.new_pairs);
        Ok(summary)
    }

    /// Run the section extractor over one sentence batch and its parse
    /// edges (spec §6: `ExtractSections`).
    #[allow(clippy::too_many_arguments)]
    pub fn extract_sections(
        &self,
        flat_tokens: &[u32],
        offsets: &[u32],
        lengths: &[u32],
        edge_p1: &[u32],
        edge_p2: &[u32],
        edge_offsets: &[u32],
        edge_counts: &[u32],
    ) -> EngineResult<ExtractionSummary> {
        let batch = SentenceBatch::new(flat_tokens, offsets, lengths)?;
        let edges = EdgeBatch::new(edge_p1, edge_p2, edge_offsets, edge_counts, batch.num_sentences())?;
        debug!(sentences = batch.num_sentences(), "ExtractSections");
        let summary = sections::extract_sections(&batch, &edges, self.options.max_connectors_per_token, &self.sections)?;
        self.diagnostics.record_sections_created(summary.new_sections);
        self.diagnostics.record_dropped_connectors(summary.dropped_connectors);
        Ok(summary)
    }

    /// `ComputeAll`: recompute MI for every live pair (spec §4.6).
    pub fn compute_mi_all(&self, total_events: f64) {
        debug!(total_events, "ComputeMI(all)");
        mi::compute_mi(&self.pairs, &self.words, self.pairs.len(), total_events, mi::Mode::All);
    }

    /// `ComputeDirty`: recompute MI for only the pairs touched since the
    /// last recompute (spec §4.6).
    pub fn compute_mi_dirty(&self, total_events: f64) {
        debug!(total_events, "ComputeMI(dirty)");
        mi::compute_mi(&self.pairs, &self.words, self.pairs.len(), total_events, mi::Mode::DirtyOnly);
    }

    /// `Stats(threshold)` (spec §4.6).
    pub fn mi_stats(&self, threshold: f64) -> MiStats {
        mi::mi_stats(&self.pairs, self.pairs.len(), threshold)
    }

    /// `Filter(threshold, maxOutput)` (spec §4.6).
    pub fn mi_filter(&self, threshold: f64, max_output: u32) -> Vec<(u32, f64)> {
        mi::mi_filter(&self.pairs, self.pairs.len(), threshold, max_output)
    }

    /// Convenience recipe chaining `CountSentences` straight into
    /// `ComputeDirty` without a host round-trip in between (spec §2: "passing
    /// handles to successor stages without host round-trips").
    pub fn count_and_refresh_mi(
        &self,
        flat_tokens: &[u32],
        offsets: &[u32],
        lengths: &[u32],
        window: u32,
        total_events: f64,
    ) -> EngineResult<CountingSummary> {
        let summary = self.count_sentences(flat_tokens, offsets, lengths, window)?;
        self.compute_mi_dirty(total_events);
        Ok(summary)
    }

    /// Run the cosine engine's five stages back to back (spec §4.7): norms,
    /// chain build, dot-product accumulation, cosine finalization, and
    /// returns nothing — call [`Self::filter_candidates`] to read results.
    pub fn build_similarity(&self) {
        debug!("CosineBuild");
        cosine::compute_word_norms(&self.sections, &self.words, self.sections.len(), self.words.len());
        self.disjunct_index.reset();
        cosine::build_disjunct_chains(&self.sections, &self.disjunct_index, self.sections.len());
        cosine::accumulate_dot_products(
            &self.sections,
            &self.disjunct_index,
            &self.candidates,
            self.sections.len(),
            self.options.max_chain_len,
            &self.diagnostics,
        );
        cosine::compute_cosines(
            &self.candidates,
            &self.words,
            self.candidates.len(),
            self.options.min_norm_sq,
            self.options.rare_word_filter,
        );
    }

    /// `FilterCandidates` (spec §4.7).
    pub fn filter_candidates(&self, threshold: f64, max_output: u32) -> Vec<(u32, f64)> {
        cosine::filter_candidates(&self.candidates, self.candidates.len(), threshold, max_output)
    }

    /// `AssignClasses` (spec §4.8).
    pub fn assign_classes(&self, word_indices: &[u32], class_ids: &[u32]) {
        substitution::assign_classes(&self.words, word_indices, class_ids);
    }

    /// Run `SubstitutePairs`, `RebuildPairIndex`, and
    /// `SubstituteSectionWords` back to back (spec §4.8,
    /// `SubstituteAndRebuild`), resetting the pair table between the first
    /// two stages as `RebuildPairIndex` requires. Takes no input beyond what
    /// `AssignClasses` already wrote onto the Word pool (spec §6: "none;
    /// reads class map").
    pub fn substitute_and_rebuild(&self) -> (SubstitutionSummary, RebuildSummary) {
        debug!("SubstituteAndRebuild");
        let substitution = substitution::substitute_pairs(&self.pairs, &self.words, self.pairs.len());
        self.pairs.table().reset();
        let rebuild = substitution::rebuild_pair_index(&self.pairs, self.pairs.len());
        substitution::substitute_section_words(&self.sections, &self.words, self.sections.len());
        (substitution, rebuild)
    }

    /// `ReadbackPool`: copy a word's SoA columns out by index (spec §4.9).
    /// Returns `EngineError::CapacityExceeded` rather than panicking when
    /// `idx` falls outside the word pool's provisioned capacity (spec §7:
    /// "the engine never crashes on in-domain input").
    pub fn read_word(&self, idx: u32) -> EngineResult<(u64, f64, u32)> {
        if idx >= self.words.capacity() {
            return Err(EngineError::CapacityExceeded {
                what: "word pool readback index",
                capacity: self.words.capacity(),
            });
        }
        Ok((self.words.name_hash(idx), self.words.count(idx), self.words.class_id(idx)))
    }

    /// `ReadbackPool`: copy a pair's SoA columns out by index (spec §4.9).
    /// See [`Self::read_word`] for the out-of-range behavior.
    pub fn read_pair(&self, idx: u32) -> EngineResult<(u32, u32, f64, f64)> {
        if idx >= self.pairs.capacity() {
            return Err(EngineError::CapacityExceeded {
                what: "pair pool readback index",
                capacity: self.pairs.capacity(),
            });
        }
        Ok((
            self.pairs.word_a(idx),
            self.pairs.word_b(idx),
            self.pairs.count(idx),
            self.pairs.mi(idx),
        ))
    }

    /// `ReadbackPool`: copy a section's SoA columns out by index (spec §4.9).
    /// See [`Self::read_word`] for the out-of-range behavior.
    pub fn read_section(&self, idx: u32) -> EngineResult<(u32, u64, f64)> {
        if idx >= self.sections.capacity() {
            return Err(EngineError::CapacityExceeded {
                what: "section pool readback index",
                capacity: self.sections.capacity(),
            });
        }
        Ok((
            self.sections.head_word(idx),
            self.sections.disjunct_hash(idx),
            self.sections.count(idx),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_options() -> BuildOptions {
        BuildOptions {
            word_table_capacity: 64,
            word_pool_capacity: 32,
            pair_table_capacity: 64,
            pair_pool_capacity: 32,
            section_table_capacity: 64,
            section_pool_capacity: 32,
            disjunct_index_capacity: 64,
            candidate_table_capacity: 64,
            candidate_pool_capacity: 32,
            probe_limit: 16,
            ..BuildOptions::default()
        }
    }

    #[test]
    fn open_rejects_invalid_options() {
        let mut opts = small_options();
        opts.max_chain_len = 0;
        assert!(Session::open(opts).is_err());
    }

    #[test]
    fn end_to_end_counting_and_mi() {
        let session = Session::open(small_options()).unwrap();
        let words = session.find_or_create_words(&[10, 20, 30, 40]);
        let flat: Vec<u32> = words.clone();
        let offsets = [0u32];
        let lengths = [4u32];
        let summary = session.count_sentences(&flat, &offsets, &lengths, 2).unwrap();
        assert_eq!(summary.new_pairs, 5);

        session.compute_mi_all(100.0);
        let stats = session.mi_stats(f64::NEG_INFINITY);
        assert_eq!(stats.pairs_with_count, 5);
    }

    #[test]
    fn end_to_end_sections_and_cosine() {
        let session = Session::open(small_options()).unwrap();
        let words = session.find_or_create_words(&[100, 200, 300]);
        let offsets = [0u32];
        let lengths = [3u32];
        let edge_p1 = [0u32, 1];
        let edge_p2 = [1u32, 2];
        let edge_offsets = [0u32];
        let edge_counts = [2u32];
        let summary = session
            .extract_sections(&words, &offsets, &lengths, &edge_p1, &edge_p2, &edge_offsets, &edge_counts)
            .unwrap();
        assert_eq!(summary.new_sections, 3);

        session.build_similarity();
        let snap = session.diagnostics();
        assert_eq!(snap.sections_created, 3);
    }

    #[test]
    fn reset_clears_pools_but_not_diagnostics() {
        let session = Session::open(small_options()).unwrap();
        session.find_or_create_words(&[1, 2, 3]);
        assert_eq!(session.words().len(), 3);
        session.reset();
        assert_eq!(session.words().len(), 0);
    }

    #[test]
    fn readback_rejects_out_of_range_index() {
        let session = Session::open(small_options()).unwrap();
        let words = session.find_or_create_words(&[1, 2]);
        assert!(session.read_word(words[0]).is_ok());
        let capacity = session.words().capacity();
        assert!(matches!(session.read_word(capacity), Err(EngineError::CapacityExceeded { .. })));
    }
}
