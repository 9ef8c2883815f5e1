//! Session build options.
//!
//! Unlike the teacher's `build.rs`-generated `SIZE_CLASSES` table, these are
//! ordinary runtime fields: the spec's Open Question (b) requires
//! `MIN_NORM_SQ` and `MAX_CHAIN_LEN` to be configurable per session rather
//! than baked in at compile time, so `OpenSession` validates a [`BuildOptions`]
//! value instead of inlining constants.

use crate::error::{EngineError, EngineResult};

/// Capacities and tunables supplied at `OpenSession`.
///
/// All capacities must be a power of two and must keep the hash table's
/// load factor at or below 0.5 (spec §3, invariant 6); this is enforced by
/// `validate`, not by the pools themselves.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Word hash-table capacity (power of two).
    pub word_table_capacity: u32,
    /// Word pool capacity (entries). Should be <= word_table_capacity / 2.
    pub word_pool_capacity: u32,
    /// Pair hash-table capacity (power of two).
    pub pair_table_capacity: u32,
    /// Pair pool capacity (entries).
    pub pair_pool_capacity: u32,
    /// Section hash-table capacity (power of two).
    pub section_table_capacity: u32,
    /// Section pool capacity (entries).
    pub section_pool_capacity: u32,
    /// Disjunct reverse-index hash-table capacity (power of two), used by
    /// the cosine engine's `BuildDisjunctChains` stage.
    pub disjunct_index_capacity: u32,
    /// Candidate hash-table capacity (power of two).
    pub candidate_table_capacity: u32,
    /// Candidate pool capacity (entries).
    pub candidate_pool_capacity: u32,
    /// Bounded linear-probe limit for every hash table in the session.
    pub probe_limit: u32,
    /// Minimum squared L2 norm a word must have for its cosine similarities
    /// to be computed (spec §4.7, default 50.0). Open Question (b).
    pub min_norm_sq: f64,
    /// Maximum disjunct-chain length the cosine engine will walk before
    /// giving up on a section (spec §4.7, default 200). Open Question (b).
    pub max_chain_len: u32,
    /// Maximum connectors collected per token before later ones are
    /// silently dropped (spec §4.5, design constant, default 32).
    pub max_connectors_per_token: u32,
    /// When `false`, `ComputeCosines` skips the `min_norm_sq` floor check
    /// entirely (Open Question (c): rare-word filtering is made optional
    /// without changing any other invariant). Default `true`.
    pub rare_word_filter: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            word_table_capacity: 1 << 20,
            word_pool_capacity: 1 << 19,
            pair_table_capacity: 1 << 22,
            pair_pool_capacity: 1 << 21,
            section_table_capacity: 1 << 21,
            section_pool_capacity: 1 << 20,
            disjunct_index_capacity: 1 << 21,
            candidate_table_capacity: 1 << 21,
            candidate_pool_capacity: 1 << 20,
            probe_limit: 64,
            min_norm_sq: 50.0,
            max_chain_len: 200,
            max_connectors_per_token: 32,
            rare_word_filter: true,
        }
    }
}

impl BuildOptions {
    /// Validate every field, returning `EngineError::BuildOption` on the
    /// first violation found.
    pub fn validate(&self) -> EngineResult<()> {
        let caps = [
            ("word_table_capacity", self.word_table_capacity),
            ("pair_table_capacity", self.pair_table_capacity),
            ("section_table_capacity", self.section_table_capacity),
            ("disjunct_index_capacity", self.disjunct_index_capacity),
            ("candidate_table_capacity", self.candidate_table_capacity),
        ];
        for (name, cap) in caps {
            if cap == 0 || !cap.is_power_of_two() {
                return Err(EngineError::BuildOption(format!(
                    "{name} ({cap}) must be a nonzero power of two"
                )));
            }
        }

        let pools = [
            ("word_pool_capacity", self.word_pool_capacity, self.word_table_capacity),
            ("pair_pool_capacity", self.pair_pool_capacity, self.pair_table_capacity),
            (
                "section_pool_capacity",
                self.section_pool_capacity,
                self.section_table_capacity,
            ),
            (
                "candidate_pool_capacity",
                self.candidate_pool_capacity,
                self.candidate_table_capacity,
            ),
        ];
        for (name, pool_cap, table_cap) in pools {
            if pool_cap == 0 {
                return Err(EngineError::BuildOption(format!("{name} must be > 0")));
            }
            // Keep load factor <= 0.5 (spec §3, invariant 6).
            if (pool_cap as u64) * 2 > table_cap as u64 {
                return Err(EngineError::BuildOption(format!(
                    "{name} ({pool_cap}) would push load factor above 0.5 for a table of capacity {table_cap}"
                )));
            }
        }

        if self.probe_limit == 0 {
            return Err(EngineError::BuildOption("probe_limit must be > 0".into()));
        }
        if !(self.min_norm_sq > 0.0) {
            return Err(EngineError::BuildOption("min_norm_sq must be > 0".into()));
        }
        if self.max_chain_len == 0 {
            return Err(EngineError::BuildOption("max_chain_len must be > 0".into()));
        }
        if self.max_connectors_per_token == 0 {
            return Err(EngineError::BuildOption(
                "max_connectors_per_token must be > 0".into(),
            ));
        }

        Ok(())
    }
}

/// Floor applied to MI/cosine denominators to avoid division by (transiently)
/// zero marginals (spec §4.6).
pub const DENOMINATOR_EPSILON: f64 = 1e-10;

/// Pair/section counts below this threshold are treated as empty and must
/// not participate in downstream stages (spec §3, invariant 3).
pub const MIN_LIVE_COUNT: f64 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        assert!(BuildOptions::default().validate().is_ok());
    }

    #[test]
    fn non_power_of_two_capacity_rejected() {
        let mut opts = BuildOptions::default();
        opts.word_table_capacity = 3;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn load_factor_above_half_rejected() {
        let mut opts = BuildOptions::default();
        opts.word_pool_capacity = opts.word_table_capacity;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn zero_chain_len_rejected() {
        let mut opts = BuildOptions::default();
        opts.max_chain_len = 0;
        assert!(opts.validate().is_err());
    }
}
