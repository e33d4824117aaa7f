//! The `Message` sum type and its typed payloads.
//!
//! Each payload is a plain `serde`-derived struct. Wire encoding is CBOR via
//! `ciborium`; no variant tag is written, since the frame header's
//! `type_id` already disambiguates which payload type to decode into.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::fileinfo::FileInfo;
use crate::header::MessageType;

/// Opaque 32-byte device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId(pub [u8; 32]);

/// A network address at which a device may be reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// The device's identifier.
    pub id: DeviceId,
    /// Human-readable name, advisory only.
    pub name: String,
    /// Addresses the device has advertised for itself.
    pub addresses: Vec<String>,
}

/// A device's membership and permissions within one shared folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDevice {
    /// The member device's identifier.
    pub id: DeviceId,
    /// Bitmask from `flags::folder_device`.
    pub flags: u32,
}

/// One shared folder's cluster membership, as advertised in a
/// `ClusterConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Stable folder identifier, shared by convention across devices.
    pub id: String,
    /// Human-readable label, advisory only.
    pub label: String,
    /// Bitmask from `flags::folder`.
    pub flags: u32,
    /// Devices sharing this folder, including the sender.
    pub devices: Vec<FolderDevice>,
}

/// First message on a connection; advances the connection from `Initial`
/// to `Ready`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfigMessage {
    /// Folders the sender knows about and wants to synchronize.
    pub folders: Vec<Folder>,
}

/// Full file list for one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMessage {
    /// Folder this index describes.
    pub folder: String,
    /// Every file the sender currently knows about in this folder.
    pub files: Vec<FileInfo>,
}

/// Incremental file list for one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexUpdateMessage {
    /// Folder this update describes.
    pub folder: String,
    /// Files that changed since the last `Index`/`IndexUpdate`.
    pub files: Vec<FileInfo>,
}

/// Request for a single block's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Request id; echoed back on the matching `Response`.
    pub id: u32,
    /// Folder the requested file belongs to.
    pub folder: String,
    /// Path-canonical name of the requested file.
    pub name: String,
    /// Byte offset of the requested block.
    pub offset: i64,
    /// Length of the requested block.
    pub size: i32,
    /// Expected content hash of the block, for verification by the sender.
    pub hash: Vec<u8>,
    /// Optional weak rolling hash, used to accelerate local matching.
    pub weak_hash: u32,
    /// Bitmask from `flags::request`.
    pub flags: u32,
}

/// Error code accompanying a `Response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Request succeeded; `data` carries the requested bytes.
    NoError,
    /// The named file does not exist.
    NoSuchFile,
    /// The file exists but could not be read (I/O error on the sender).
    InvalidFile,
    /// The request was otherwise malformed or could not be fulfilled.
    Generic,
}

/// Answer to a `Request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Echoes the `RequestMessage::id` this responds to.
    pub id: u32,
    /// Requested bytes; empty unless `code` is `NoError`.
    pub data: Vec<u8>,
    /// Outcome of the request.
    pub code: ErrorCode,
}

/// One in-flight block's partial download state, as advertised by
/// `DownloadProgress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDownloadProgressUpdate {
    /// Name of the file being downloaded.
    pub name: String,
    /// Offsets of blocks already received.
    pub winsorized_block_indexes: Vec<i32>,
}

/// Advisory hints about partial downloads in progress for a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgressMessage {
    /// Folder these hints apply to.
    pub folder: String,
    /// Per-file partial download state.
    pub updates: Vec<FileDownloadProgressUpdate>,
}

/// Graceful shutdown notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseMessage {
    /// Human-readable reason for the close, logged by the peer.
    pub reason: String,
}

/// The eight messages exchanged over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// See [`ClusterConfigMessage`].
    ClusterConfig(ClusterConfigMessage),
    /// See [`IndexMessage`].
    Index(IndexMessage),
    /// See [`IndexUpdateMessage`].
    IndexUpdate(IndexUpdateMessage),
    /// See [`RequestMessage`].
    Request(RequestMessage),
    /// See [`ResponseMessage`].
    Response(ResponseMessage),
    /// See [`DownloadProgressMessage`].
    DownloadProgress(DownloadProgressMessage),
    /// Liveness keepalive; carries no payload.
    Ping,
    /// See [`CloseMessage`].
    Close(CloseMessage),
}

impl Message {
    /// The wire message type for this variant.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ClusterConfig(_) => MessageType::ClusterConfig,
            Self::Index(_) => MessageType::Index,
            Self::IndexUpdate(_) => MessageType::IndexUpdate,
            Self::Request(_) => MessageType::Request,
            Self::Response(_) => MessageType::Response,
            Self::DownloadProgress(_) => MessageType::DownloadProgress,
            Self::Ping => MessageType::Ping,
            Self::Close(_) => MessageType::Close,
        }
    }

    /// Encode this message's payload (not including the frame header) as
    /// CBOR into `buf`.
    pub fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        macro_rules! write_payload {
            ($value:expr) => {
                ciborium::into_writer($value, buf).map_err(|e| ProtocolError::Encode(e.to_string()))
            };
        }

        match self {
            Self::ClusterConfig(m) => write_payload!(m),
            Self::Index(m) => write_payload!(m),
            Self::IndexUpdate(m) => write_payload!(m),
            Self::Request(m) => write_payload!(m),
            Self::Response(m) => write_payload!(m),
            Self::DownloadProgress(m) => write_payload!(m),
            Self::Ping => Ok(()),
            Self::Close(m) => write_payload!(m),
        }
    }

    /// The encoded size in bytes of this message's payload.
    pub fn size(&self) -> Result<usize, ProtocolError> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf)?;
        Ok(buf.len())
    }

    /// Decode a message payload given the frame header's message type.
    ///
    /// `message_type` must already have been recovered from the header via
    /// [`MessageType::from_u16`]; an unrecognized raw type is the caller's
    /// responsibility to skip before calling this.
    pub fn decode(message_type: MessageType, bytes: &[u8]) -> Result<Self, ProtocolError> {
        macro_rules! read_payload {
            ($variant:ident) => {
                ciborium::from_reader(bytes)
                    .map(Self::$variant)
                    .map_err(|e| ProtocolError::Decode(e.to_string()))
            };
        }

        match message_type {
            MessageType::ClusterConfig => read_payload!(ClusterConfig),
            MessageType::Index => read_payload!(Index),
            MessageType::IndexUpdate => read_payload!(IndexUpdate),
            MessageType::Request => read_payload!(Request),
            MessageType::Response => read_payload!(Response),
            MessageType::DownloadProgress => read_payload!(DownloadProgress),
            MessageType::Ping => Ok(Self::Ping),
            MessageType::Close => read_payload!(Close),
        }
    }
}
