//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, shared by the packet decoders,
//! the spectral and intensity pipeline, and the record store. Using the `thiserror` crate,
//! every failure carries enough context (byte offsets, declared vs. available lengths,
//! window sizes) for the caller to log the problem and discard the affected unit.
//!
//! ## Error Hierarchy
//!
//! - **Decoder errors** (`SizeOverflow`, `TruncatedPacket`, `EnvelopeTooShort`): the current
//!   bus message is unusable. Drop it; no cross-message state exists to repair.
//! - **Codec/record errors** (`TruncatedInput`, `CorruptFrame`, `FrameTooLarge`): the affected unit is lost.
//!   Frames preceding a corrupt frame in a record file remain valid.
//! - **Window errors** (`InsufficientWindow`, `WindowLengthMismatch`, `NonPositiveAmplitude`):
//!   the analysis window cannot produce a result. For `InsufficientWindow` the caller should
//!   accumulate more samples and retry with a fresh window.
//! - **Ambient errors** (`Io`, `Config`, `Configuration`, `InvalidTopic`, `NoDestination`).
//!
//! Nothing is retried internally.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Every failure surfaced by the decoders, the analysis and the record store.
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Sub-packet size overflow at byte {offset}: declared count {declared}")]
    SizeOverflow { offset: usize, declared: i32 },

    #[error("Truncated sub-packet at byte {offset}: needs {needed} bytes, {available} available")]
    TruncatedPacket {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Message envelope too short: {len} bytes, need at least {required}")]
    EnvelopeTooShort { len: usize, required: usize },

    #[error("Truncated input: {len} bytes is not a whole number of {unit}-byte values")]
    TruncatedInput { len: usize, unit: usize },

    #[error("Corrupt frame at byte {offset}: {field} declared {declared} bytes, {available} readable")]
    CorruptFrame {
        offset: u64,
        field: &'static str,
        declared: usize,
        available: usize,
    },

    #[error("Frame payload of {len} bytes exceeds the length field")]
    FrameTooLarge { len: usize },

    #[error("Insufficient window: {len} samples, need more than {required}")]
    InsufficientWindow { len: usize, required: usize },

    #[error("Window length mismatch: expected {expected} samples per axis, got {actual}")]
    WindowLengthMismatch { expected: usize, actual: usize },

    #[error("Intensity undefined for non-positive peak amplitude {amplitude}")]
    NonPositiveAmplitude { amplitude: f64 },

    #[error("Invalid topic '{0}': expected <device>/<group>/<kind>")]
    InvalidTopic(String),

    #[error("Record store has no destination")]
    NoDestination,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl DaqError {
    /// Whether the caller may retry the operation with fresh input.
    ///
    /// Only `InsufficientWindow` qualifies: accumulate more samples and try a new window.
    /// Everything else means the affected unit must be discarded.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, DaqError::InsufficientWindow { .. })
    }
}
