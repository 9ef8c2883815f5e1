use std::sync::atomic::{AtomicU64, Ordering};

pub struct Diagnostics {
    dropped_connectors: AtomicU64,
    sections_created: AtomicU64,
    pairs_created: AtomicU64,
    chain_len_sum: AtomicU64,
    chain_len_count: AtomicU64,
    chain_len_max: AtomicU64,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            dropped_connectors: AtomicU64::new(0),
            sections_created: AtomicU64::new(0),
            pairs_created: AtomicU64::new(0),
            chain_len_sum: AtomicU64::new(0),
            chain_len_count: AtomicU64::new(0),
            chain_len_max: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_dropped_connectors(&self, n: u64) {
        if n > 0 {
            self.dropped_connectors.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_sections_created(&self, n: u64) {
        if n > 0 {
            self.sections_created.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_pairs_created(&self, n: u64) {
        if n > 0 {
            self.pairs_created.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Record one cosine-engine chain walk of `len` hops (spec §4.7:
    /// the chain-length cap is what bounds the pathological case of a
    /// disjunct shared by a huge number of sections).
    #[inline]
    pub fn record_chain_len(&self, len: u32) {
        self.chain_len_sum.fetch_add(len as u64, Ordering::Relaxed);
        self.chain_len_count.fetch_add(1, Ordering::Relaxed);
        self.chain_len_max.fetch_max(len as u64, Ordering::Relaxed);
    }

    /// Load every counter and return a point-in-time [`Snapshot`]. Like the
    /// teacher's `stats::snapshot()`, each field is individually atomic but
    /// the snapshot as a whole is not globally consistent with concurrent
    /// stage launches.
    pub fn snapshot(&self) -> Snapshot {
        let chain_len_count = self.chain_len_count.load(Ordering::Relaxed);
        let chain_len_sum = self.chain_len_sum.load(Ordering::Relaxed);
        Snapshot {
            dropped_connectors: self.dropped_connectors.load(Ordering::Relaxed),
            sections_created: self.sections_created.load(Ordering::Relaxed),
            pairs_created: self.pairs_created.load(Ordering::Relaxed),
            chain_len_count,
            chain_len_max: self.chain_len_max.load(Ordering::Relaxed),
            chain_len_avg: if chain_len_count > 0 {
                chain_len_sum as f64 / chain_len_count as f64
            } else {
                0.0
            },
        }
    }
}

/// A point-in-time snapshot of a session's diagnostics counters.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub dropped_connectors: u64,
    pub sections_created: u64,
    pub pairs_created: u64,
    pub chain_len_count: u64,
    pub chain_len_max: u64,
    pub chain_len_avg: f64,
}
