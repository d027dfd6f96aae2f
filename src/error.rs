//! Error handling for the LC3 fixed-point signal-processing core.
//!
//! Per the codec's error-handling design, the hot path itself never faults —
//! every arithmetic stage produces a valid numerical result via saturation.
//! `CodecError` only surfaces at the instance-lifecycle boundary (open/reset)
//! and at the few points where external bitstream corruption is detectable
//! (a malformed PVQ index).

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors the fixed-point core can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// `(sampling_rate, frame_duration)` is not one of the standardized
    /// combinations. Detected at codec open; never reached on the hot path.
    #[error("unsupported configuration: {sample_rate_hz} Hz / {frame_dms} dms is not a standardized LC3 rate/duration pair")]
    UnsupportedConfiguration {
        sample_rate_hz: u32,
        frame_dms: u16,
    },

    /// A PCM input buffer did not match the frame length implied by the
    /// codec's configuration.
    #[error("invalid frame length: expected {expected} samples, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    /// A scratch-arena carving request exceeded the remaining capacity of
    /// the arena. This indicates a stage requested more scratch than the
    /// arena was sized for; reported rather than panicking so debug tooling
    /// can assert on arena sizing instead of aborting the process.
    #[error("scratch arena exhausted: requested {requested} bytes, {available} available")]
    ScratchExhausted { requested: usize, available: usize },

    /// `pvq_dec_deidx` observed an index at or beyond the enumeration size
    /// for `(n, k)`. Per § 7, recovery is to substitute a deterministic
    /// zero vector and continue decoding; this variant lets the caller log
    /// a BER (bit-error-rate) flag before that substitution happens.
    #[error("malformed PVQ index: {index} >= enumeration size {size} for (n={n}, k={k})")]
    MalformedPvqIndex {
        index: u32,
        size: u32,
        n: usize,
        k: usize,
    },

    /// The requested output bit depth is not one of 16/24/32.
    #[error("unsupported output bit depth: {bits} (supported: 16, 24, 32)")]
    UnsupportedOutputDepth { bits: u32 },
}
