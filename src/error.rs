//! Error taxonomy for the engine.
//!
//! Per-worker failures (a launch hitting a full pool or an exhausted probe
//! chain) are *not* represented here — they surface as sentinel indices in
//! the caller's output array, per the engine's propagation policy. The
//! variants below cover only the synchronous, session-level failures: a
//! malformed batch rejected before any pool is touched, or an invalid build
//! option caught at `OpenSession`.

/// Session-level error kinds.
///
/// `CapacityExceeded` and `ProbeExhausted` also exist as *per-worker*
/// outcomes (returned as [`crate::EMPTY_VALUE`] in an output array); they
/// appear here only when the orchestrator itself needs to report them
/// synchronously (e.g. a readback request against an out-of-range index).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A pool or hash table has no free slot for the requested allocation.
    #[error("capacity exceeded for {what} (capacity {capacity})")]
    CapacityExceeded { what: &'static str, capacity: u32 },

    /// Linear probing hit the bounded probe limit before resolving a slot.
    #[error("probe limit exhausted after {limit} probes")]
    ProbeExhausted { limit: u32 },

    /// A batch's offsets/lengths do not describe a valid partition of the
    /// flat token array; the stage rejects the launch without mutating any
    /// pool.
    #[error("malformed input: {0}")]
    InputMalformed(String),

    /// A required build-time option was missing or out of range. Detected
    /// at `OpenSession`; fatal.
    #[error("invalid build option: {0}")]
    BuildOption(String),
}

/// Convenience alias used throughout the crate's public API.
pub type EngineResult<T> = Result<T, EngineError>;
