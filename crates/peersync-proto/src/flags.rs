//! Bit-flag constants that are part of the wire format.
//!
//! These are plain bitmask constants rather than `bitflags!`-generated types
//! because each one lives inside a different message field (`u32`): the bits
//! round-trip through CBOR as plain numbers, and no local validation is
//! needed beyond masking.

/// `Request` message flags.
pub mod request {
    /// The requested bytes originate from a temporary (in-progress) file.
    pub const FROM_TEMPORARY: u32 = 1 << 0;
}

/// `Folder` flags (inside `ClusterConfig`).
pub mod folder {
    /// Folder is read-only from the sender's perspective.
    pub const READ_ONLY: u32 = 1 << 0;
    /// Ignore permission bits when comparing file metadata.
    pub const IGNORE_PERMS: u32 = 1 << 1;
    /// Ignore deletions originating from this folder.
    pub const IGNORE_DELETE: u32 = 1 << 2;
    /// Temporary indexes are disabled for this folder.
    pub const DISABLED_TEMP_INDEXES: u32 = 1 << 3;
    /// Mask covering all defined folder flag bits.
    pub const MASK: u32 = 0x0F;
}

/// `FolderDevice` flags (inside `ClusterConfig`).
pub mod folder_device {
    /// The device is trusted to share this folder.
    pub const SHARE_TRUSTED: u32 = 1 << 0;
    /// The device receives this folder read-only.
    pub const SHARE_READ_ONLY: u32 = 1 << 1;
    /// The device is an introducer for this folder's cluster.
    pub const INTRODUCER: u32 = 1 << 2;
    /// Mask covering all defined share-bit flag bits.
    pub const SHARE_BITS: u32 = 0x0000_00FF;
}

/// `FileInfo` local flags. These never appear on the wire directly; they are
/// mapped to the `invalid` bit (and a conflict marker) on outgoing FileInfos
/// by [`crate::fileinfo::FileInfo::apply_local_flags`].
pub mod file_info_local {
    /// The file uses a feature this implementation cannot represent.
    pub const UNSUPPORTED: u32 = 1 << 0;
    /// The file is excluded by ignore patterns.
    pub const IGNORED: u32 = 1 << 1;
    /// The file must be rescanned before it can be trusted.
    pub const MUST_RESCAN: u32 = 1 << 2;
    /// The folder is receive-only and this file has local-only changes.
    pub const RECEIVE_ONLY: u32 = 1 << 3;

    /// Local flags that, in addition to marking `invalid`, also mark the file
    /// as conflicting with whatever successor overwrites it.
    pub const CONFLICTING: u32 = UNSUPPORTED | IGNORED | RECEIVE_ONLY;
}
