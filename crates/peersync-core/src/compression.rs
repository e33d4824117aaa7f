//! LZ4 compression policy for message bodies.
//!
//! `lz4_flex::compress_prepend_size`/`decompress_size_prepended` prepend a
//! little-endian `u32` uncompressed-size header to the block. The wire
//! format calls for that prefix in big-endian, matching the rest of the
//! frame's integers, so every compressed body gets its first four bytes
//! byte-swapped on the way out and back on the way in.

use crate::error::{EngineError, Result};

/// Bodies smaller than this are never worth compressing; the LZ4 framing
/// overhead would outweigh the savings.
pub const COMPRESSION_THRESHOLD: usize = 128;

/// When a connection applies LZ4 compression to outgoing message bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPolicy {
    /// Never compress.
    Never,
    /// Compress every body at or above [`COMPRESSION_THRESHOLD`].
    Always,
    /// Compress only `ClusterConfig`, `Index`, and `IndexUpdate` bodies.
    MetadataOnly,
}

impl CompressionPolicy {
    /// Whether a body of `message_type` and `len` bytes should be
    /// compressed under this policy.
    #[must_use]
    pub fn should_compress(self, message_type: peersync_proto::MessageType, len: usize) -> bool {
        use peersync_proto::MessageType::{ClusterConfig, Index, IndexUpdate};

        if len < COMPRESSION_THRESHOLD {
            return false;
        }

        match self {
            Self::Never => false,
            Self::Always => true,
            Self::MetadataOnly => matches!(message_type, ClusterConfig | Index | IndexUpdate),
        }
    }
}

/// Swap the first four bytes of `buf` (the prepended size prefix) between
/// little-endian and big-endian. Applying this twice is the identity.
fn swap_lz4_size_prefix(buf: &mut [u8]) {
    if buf.len() >= 4 {
        buf[0..4].reverse();
    }
}

/// Compress `data`, producing a big-endian-size-prefixed LZ4 block suitable
/// for the wire.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut block = lz4_flex::compress_prepend_size(data);
    swap_lz4_size_prefix(&mut block);
    block
}

/// Decompress a big-endian-size-prefixed LZ4 block received from the wire.
pub fn decompress(block: &[u8]) -> Result<Vec<u8>> {
    let mut little_endian_prefixed = block.to_vec();
    swap_lz4_size_prefix(&mut little_endian_prefixed);
    lz4_flex::decompress_size_prepended(&little_endian_prefixed)
        .map_err(|e| EngineError::Compression(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_data() {
        let data = b"the quick brown fox jumps over the lazy dog, repeatedly, to pad this out";
        let compressed = compress(data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn size_prefix_is_big_endian_on_the_wire() {
        let data = vec![7u8; 1000];
        let compressed = compress(&data);
        let prefix = u32::from_be_bytes(compressed[0..4].try_into().unwrap());
        assert_eq!(prefix as usize, data.len());
    }

    #[test]
    fn policy_respects_threshold() {
        let short = vec![0u8; COMPRESSION_THRESHOLD - 1];
        assert!(!CompressionPolicy::Always
            .should_compress(peersync_proto::MessageType::Index, short.len()));

        let long = vec![0u8; COMPRESSION_THRESHOLD + 1];
        assert!(CompressionPolicy::Always
            .should_compress(peersync_proto::MessageType::Index, long.len()));
    }

    #[test]
    fn metadata_only_skips_request_response() {
        let long = vec![0u8; COMPRESSION_THRESHOLD + 1];
        assert!(!CompressionPolicy::MetadataOnly
            .should_compress(peersync_proto::MessageType::Request, long.len()));
        assert!(CompressionPolicy::MetadataOnly
            .should_compress(peersync_proto::MessageType::Index, long.len()));
    }
}
