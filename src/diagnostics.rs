//! Session diagnostics counters.
//!
//! Mirrors the teacher's `stats.rs`/`histogram.rs` global-atomics-plus-
//! `Snapshot` pattern, but scoped to one [`crate::session::Session`] instead
//! of a process-wide static: a session is not a singleton (Design Notes §9:
//! "a multi-session extension would carry no shared state"), so these
//! counters live on the session's `Diagnostics` value rather than behind a
//! `static`. All counters use `Relaxed` ordering — they are observational
//! only, never a synchronization primitive.
//!
//! Gated behind the `diagnostics` feature, exactly as the teacher gates its
//! own stats/histogram modules behind feature flags: with the feature off,
//! [`Diagnostics`] compiles down to a zero-sized no-op so recording calls on
//! the hot path cost nothing.

cfg_if::cfg_if! {
    if #[cfg(feature = "diagnostics")] {
        mod enabled;
        pub use enabled::{Diagnostics, Snapshot};
    } else {
        mod disabled;
        pub use disabled::{Diagnostics, Snapshot};
    }
}
