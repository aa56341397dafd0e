//! Error types for the TAF codec pipeline.

use std::io;

/// Result type alias for TAF codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while building or reading a TAF file.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The external decoder process could not be spawned or exited abnormally.
    #[error("decoder process failed: {0}")]
    DecoderFailed(String),

    /// The Opus encoder rejected a frame.
    #[error("opus encode failed: {0}")]
    EncodeFailed(String),

    /// A packet did not fit in the remaining space of the current page and
    /// would have needed to straddle a page boundary.
    #[error("packet of {packet_len} bytes overflows page (only {remaining} bytes free)")]
    PageOverflow { packet_len: usize, remaining: usize },

    /// The serialized header exceeded the 4092-byte budget.
    #[error("TAF header serialization too large: {0} bytes (max 4092)")]
    HeaderTooLarge(usize),

    /// `new_chapter` was called more times than `MAX_CHAPTERS` allows.
    #[error("too many chapters: limit is {0}")]
    TooManyChapters(usize),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    IoFailed(#[from] io::Error),

    /// The TAF file is shorter than its own header claims.
    #[error("TAF file truncated: expected at least {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    /// The header region failed to parse as a well-formed protobuf message.
    #[error("malformed TAF header: {0}")]
    MalformedHeader(String),
}
