//! Transport-agnostic wire types for the peer-to-peer synchronization
//! protocol: frame headers, the `Message` sum type and its payloads,
//! `FileInfo` validation, block sizing, and wire flag constants.
//!
//! This crate has no async runtime dependency and performs no I/O; it is
//! consumed by `peersync-core`, which owns the connection engine.

pub mod blocksize;
pub mod error;
pub mod fileinfo;
pub mod flags;
pub mod header;
pub mod message;

pub use blocksize::{block_size, BLOCK_SIZES, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use error::{ProtocolError, Result};
pub use fileinfo::{check_file_info_consistency, check_filename, BlockInfo, FileInfo, FileType};
pub use header::{Compression, Header, MessageType};
pub use message::{
    ClusterConfigMessage, CloseMessage, Device, DeviceId, DownloadProgressMessage, ErrorCode,
    FileDownloadProgressUpdate, Folder, FolderDevice, IndexMessage, IndexUpdateMessage, Message,
    RequestMessage, ResponseMessage,
};
