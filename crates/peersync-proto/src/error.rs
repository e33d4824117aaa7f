//! Wire-level error types.

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
///
/// These are purely structural/codec errors; connection-level policy (what
/// to do when one occurs) lives in `peersync-core`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The header length prefix exceeded the 65535-byte wire limit.
    #[error("header length {0} exceeds maximum of 65535")]
    HeaderTooLarge(usize),

    /// The message length prefix exceeded the 500,000,000-byte wire cap.
    #[error("message length {0} exceeds maximum of 500000000")]
    MessageTooLarge(usize),

    /// A length prefix decoded to a negative value when interpreted as signed.
    #[error("negative length encountered while decoding a frame")]
    NegativeLength,

    /// The header named a compression scheme this implementation does not know.
    #[error("unknown compression id {0}")]
    UnknownCompression(u8),

    /// CBOR encoding of a payload failed.
    #[error("failed to encode message payload: {0}")]
    Encode(String),

    /// CBOR decoding of a payload failed.
    #[error("failed to decode message payload: {0}")]
    Decode(String),

    /// A filename failed `check_filename`.
    #[error("invalid filename {name:?}: {reason}")]
    InvalidFilename {
        /// The rejected filename.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A `FileInfo` failed its structural consistency predicates.
    #[error("inconsistent FileInfo {name:?}: {reason}")]
    InvalidFileInfo {
        /// The offending file's name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Convenience alias for results returning [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;
