//! Discovered filesystem entries.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// BLAKE3 content hash of a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Which of the two trees an entry or message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeSide {
    Source,
    Destination,
}

impl TreeSide {
    /// Both sides, source first.
    pub const BOTH: [TreeSide; 2] = [TreeSide::Source, TreeSide::Destination];

    /// Short lowercase name, used for thread names and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
        }
    }
}

impl fmt::Display for TreeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of entry and the metadata that only files carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Regular file.
    File {
        /// Size in bytes.
        size: u64,
        /// Last modification time.
        modified: SystemTime,
        /// Content hash, present only when hashing is enabled.
        hash: Option<ContentHash>,
    },
    /// Directory.
    Directory,
}

impl EntryKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File { .. })
    }
}

/// One file or directory under a tree root.
///
/// `path` is relative to the root, uses `/` as separator and has no leading
/// slash. Two entries with equal paths on the source and destination sides
/// describe the same logical object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Path relative to the tree root.
    pub path: CompactString,
    /// Kind and file metadata.
    pub kind: EntryKind,
    /// Permission bits.
    pub mode: u32,
}

impl Entry {
    /// Create a file entry.
    pub fn file(
        path: impl Into<CompactString>,
        mode: u32,
        size: u64,
        modified: SystemTime,
        hash: Option<ContentHash>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File {
                size,
                modified,
                hash,
            },
            mode,
        }
    }

    /// Create a directory entry.
    pub fn directory(path: impl Into<CompactString>, mode: u32) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            mode,
        }
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// File size, `None` for directories.
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            EntryKind::File { size, .. } => Some(*size),
            EntryKind::Directory => None,
        }
    }

    /// Modification time, `None` for directories.
    pub fn modified(&self) -> Option<SystemTime> {
        match &self.kind {
            EntryKind::File { modified, .. } => Some(*modified),
            EntryKind::Directory => None,
        }
    }

    /// Absolute location of this entry under `root`.
    pub fn absolute(&self, root: &Path) -> PathBuf {
        join_relative(root, &self.path)
    }

    /// Whether `self` lies strictly beneath the directory path `dir`.
    pub fn is_beneath(&self, dir: &str) -> bool {
        self.path.len() > dir.len()
            && self.path.starts_with(dir)
            && self.path.as_bytes()[dir.len()] == b'/'
    }
}

/// Join a `/`-separated relative path onto `root`.
///
/// Empty segments are dropped, so a leading or doubled slash never
/// replaces or repeats the root.
pub fn join_relative(root: &Path, relative: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}
