//! `FileInfo` and the filename/consistency validation helpers.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::flags::file_info_local;

/// Kind of filesystem entry a `FileInfo` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file with a block list.
    File,
    /// Directory; never carries blocks.
    Directory,
    /// Symbolic link.
    Symlink,
}

/// A single content block within a file, as advertised in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Byte offset of this block within the file.
    pub offset: i64,
    /// Length of this block in bytes.
    pub size: i32,
    /// Content hash of this block (algorithm is a host concern).
    pub hash: Vec<u8>,
}

/// Metadata record describing a file, directory, or symlink plus its block
/// list. Consumed, not owned, by the engine: the host model is the source of
/// truth, the engine only validates and forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path-canonical name, relative to the folder root.
    pub name: String,
    /// File, Directory, or Symlink.
    pub file_type: FileType,
    /// Size in bytes (meaningless for directories).
    pub size: i64,
    /// Modification time as seconds since epoch.
    pub modified_s: i64,
    /// True if this record represents a deletion tombstone.
    pub deleted: bool,
    /// True if this record could not be scanned/hashed correctly.
    pub invalid: bool,
    /// True if this record conflicts with whatever successor overwrites it.
    /// Set by [`FileInfo::apply_local_flags`], never by the peer.
    pub conflicting: bool,
    /// Content block list. Must be empty for directories and deletions.
    pub blocks: Vec<BlockInfo>,
}

impl FileInfo {
    /// Whether this record is fit to be used as a source for block transfer.
    ///
    /// A file is only expected to carry blocks when it is a non-deleted,
    /// non-invalid, `File`-typed record.
    #[must_use]
    pub fn is_block_source(&self) -> bool {
        self.file_type == FileType::File && !self.deleted && !self.invalid
    }

    /// Fold a host's local flags (`flags::file_info_local`) into this
    /// record before it goes out on the wire.
    ///
    /// Local flags never appear on the wire directly: any of them being set
    /// forces `invalid`, and `Unsupported`, `Ignored`, or `ReceiveOnly`
    /// additionally mark the file `conflicting` with whatever successor
    /// overwrites it. `MustRescan` alone forces `invalid` without marking a
    /// conflict.
    pub fn apply_local_flags(&mut self, local_flags: u32) {
        const RELEVANT: u32 = file_info_local::UNSUPPORTED
            | file_info_local::IGNORED
            | file_info_local::MUST_RESCAN
            | file_info_local::RECEIVE_ONLY;

        if local_flags & RELEVANT != 0 {
            self.invalid = true;
        }
        if local_flags & file_info_local::CONFLICTING != 0 {
            self.conflicting = true;
        }
    }
}

/// Logically clean a `/`-separated path the way `check_filename` requires:
/// collapse duplicate separators, drop `.` segments, resolve `..` segments
/// against preceding components, and drop any trailing separator.
///
/// This mirrors POSIX `path.Clean`/`lexical clean` semantics closely enough
/// for filename validation: names are compared against their cleaned form,
/// and any difference is a rejection.
fn lexically_clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                },
                _ if !rooted => out.push(".."),
                _ => {},
            },
            other => out.push(other),
        }
    }

    let mut cleaned = out.join("/");
    if rooted {
        cleaned = format!("/{cleaned}");
    }
    if cleaned.is_empty() {
        cleaned = ".".to_string();
    }
    cleaned
}

/// Validate a filename's wire acceptability.
///
/// Rejects: empty names, `.`, `..`, names starting with `/`, names starting
/// with `../`, and any name whose path-canonical form differs from itself
/// (trailing slashes, duplicate separators, embedded `.`/`..` segments all
/// collapse under canonicalization and so fail this check).
pub fn check_filename(name: &str) -> Result<(), ProtocolError> {
    let reject = |reason: &'static str| {
        Err(ProtocolError::InvalidFilename { name: name.to_string(), reason })
    };

    if name.is_empty() {
        return reject("empty name");
    }
    if name == "." {
        return reject("name is '.'");
    }
    if name == ".." {
        return reject("name is '..'");
    }
    if name.starts_with('/') {
        return reject("name has a leading '/'");
    }
    if name.starts_with("../") {
        return reject("name has a leading '../'");
    }
    if lexically_clean(name) != name {
        return reject("name is not in path-canonical form");
    }

    Ok(())
}

/// Validate the structural invariants of an inbound `FileInfo`.
pub fn check_file_info_consistency(info: &FileInfo) -> Result<(), ProtocolError> {
    check_filename(&info.name)?;

    let reject = |reason: &'static str| {
        Err(ProtocolError::InvalidFileInfo { name: info.name.clone(), reason })
    };

    if info.deleted && !info.blocks.is_empty() {
        return reject("deleted FileInfo carries a non-empty block list");
    }
    if info.file_type == FileType::Directory && !info.blocks.is_empty() {
        return reject("Directory FileInfo carries a non-empty block list");
    }
    if info.file_type == FileType::File
        && !info.deleted
        && !info.invalid
        && info.blocks.is_empty()
    {
        return reject("valid, non-deleted File FileInfo has an empty block list");
    }

    Ok(())
}
