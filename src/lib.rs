//! A GPU-resident-style associative data engine, hosted on a CPU thread
//! pool (`rayon`) instead of an actual accelerator.
//!
//! The engine maintains three content-addressed atom pools — Word, Pair,
//! Section — each a lock-free hash table paired with a struct-of-arrays bump
//! allocator (see [`hash_table`] and [`pool`]), plus a transient Candidate
//! pool used only during cosine computation. A compute pipeline
//! ([`pipeline`]) runs sliding-window co-occurrence counting, parse-edge
//! section extraction, mutual-information scoring, cosine similarity, and
//! externally-driven class substitution over those pools as fork-join
//! stages with no intra-stage synchronization beyond atomics. [`Session`]
//! is the single entry point a host program drives: open with validated
//! [`BuildOptions`], issue batch commands, read results back.
//!
//! ```ignore
//! use assoc_engine::{BuildOptions, Session};
//!
//! let session = Session::open(BuildOptions::default())?;
//! let words = session.find_or_create_words(&content_hashes);
//! session.count_sentences(&flat_tokens, &offsets, &lengths, 5)?;
//! session.compute_mi_all(total_events);
//! let strong_pairs = session.mi_filter(1.0, 1000);
//! # Ok::<(), assoc_engine::EngineError>(())
//! ```

pub mod atomic_float;
pub mod atoms;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hash_table;
pub mod pipeline;
pub mod pool;
pub mod session;

pub use config::BuildOptions;
pub use error::{EngineError, EngineResult};
pub use hash_table::{EMPTY_KEY, EMPTY_VALUE};
pub use session::Session;
