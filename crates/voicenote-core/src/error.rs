//! Error type shared by every composition stage.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Tagged failure of a composition stage.
///
/// Stages return these unchanged; the pipeline forwards them to the caller as-is.
#[derive(Error, Debug)]
pub enum Error {
    /// Source bytes could not be turned into a PCM buffer.
    #[error("source audio unreadable ({source_name}): {reason}")]
    Decode { source_name: String, reason: String },

    /// Buffers to be mixed were sampled at different rates.
    #[error("sample rate mismatch: {left} Hz vs {right} Hz")]
    SampleRateMismatch { left: u32, right: u32 },

    /// Slice bounds are invalid for the buffer.
    #[error("{0}")]
    Range(String),

    /// Copying channel data failed part-way through a slice.
    #[error("slice failed on channel {channel}: {reason}")]
    Slice { channel: usize, reason: String },

    /// The merged buffer did not exceed the requested bound.
    #[error("merged duration {merged_ms} ms does not exceed target {target_ms} ms")]
    DurationPolicy { merged_ms: u64, target_ms: u64 },

    #[error("encode failed: {0}")]
    Encode(String),

    /// Channel layout violates the buffer invariants.
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("nothing to mix")]
    EmptyMix,

    /// A run is already in progress on this pipeline.
    #[error("composition already in progress")]
    Busy,

    #[error("composition cancelled")]
    Cancelled,

    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("effect library error: {0}")]
    Library(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn decode(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Error::Decode {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
