//! The small fixed-shape header that precedes every frame's message body.

use crate::error::ProtocolError;

/// The eight message kinds exchanged over a connection, in their wire
/// discriminant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `ClusterConfig` — first message on a connection, moves it to `Ready`.
    ClusterConfig = 0,
    /// `Index` — full file list for a folder.
    Index = 1,
    /// `IndexUpdate` — incremental file list for a folder.
    IndexUpdate = 2,
    /// `Request` — ask the peer for a block's bytes.
    Request = 3,
    /// `Response` — answer to a `Request`.
    Response = 4,
    /// `DownloadProgress` — in-flight partial download hints.
    DownloadProgress = 5,
    /// `Ping` — liveness keepalive, no payload.
    Ping = 6,
    /// `Close` — graceful shutdown notice with a reason.
    Close = 7,
}

impl MessageType {
    /// Recover a `MessageType` from its wire discriminant.
    ///
    /// Returns `None` for unrecognized values. This is not an error: it
    /// means "skip this frame, the peer is newer".
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::ClusterConfig),
            1 => Some(Self::Index),
            2 => Some(Self::IndexUpdate),
            3 => Some(Self::Request),
            4 => Some(Self::Response),
            5 => Some(Self::DownloadProgress),
            6 => Some(Self::Ping),
            7 => Some(Self::Close),
            _ => None,
        }
    }

    /// The wire discriminant for this message type.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Compression scheme applied to a frame's message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Body is the raw CBOR encoding, uncompressed.
    None = 0,
    /// Body is LZ4-block-compressed.
    Lz4 = 1,
}

impl Compression {
    /// Recover a `Compression` from its wire discriminant.
    ///
    /// Unlike an unrecognized message type, an unrecognized compression id is
    /// fatal: the receiver cannot know how to interpret the bytes that
    /// follow, so the frame boundary itself is lost.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Lz4),
            _ => None,
        }
    }

    /// The wire discriminant for this compression scheme.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Frame header: message type plus compression scheme.
///
/// The header itself is transmitted as a CBOR-encoded pair wrapped in the
/// frame's two-length-prefix envelope; `type_id`/`compression_id` are the
/// raw wire integers so that an unrecognized `type_id` can still be decoded
/// (and skipped) without choking on an unknown enum variant.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Header {
    /// Raw message-type discriminant as seen on the wire.
    pub type_id: u16,
    /// Raw compression-scheme discriminant as seen on the wire.
    pub compression_id: u8,
}

impl Header {
    /// Build a header for a known message type and compression scheme.
    #[must_use]
    pub fn new(message_type: MessageType, compression: Compression) -> Self {
        Self { type_id: message_type.as_u16(), compression_id: compression.as_u8() }
    }

    /// The message type this header names, or `None` if unrecognized.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u16(self.type_id)
    }

    /// The compression scheme this header names.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownCompression`] if the id is not one
    /// this implementation recognizes; callers must treat this as fatal to
    /// the connection, not a skippable frame.
    pub fn compression(&self) -> Result<Compression, ProtocolError> {
        Compression::from_u8(self.compression_id)
            .ok_or(ProtocolError::UnknownCompression(self.compression_id))
    }
}
