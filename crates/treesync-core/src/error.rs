//! Error types for synchronization runs.
//!
//! Fatal problems abort a run through [`SyncError`]. Per-entry problems are
//! collected as [`SyncIssue`]s and reported at the end without stopping
//! sibling work.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::entry::TreeSide;

/// Errors from reading one entry's metadata or content.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Path vanished between listing and probing.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Neither a regular file nor a directory.
    #[error("Unsupported file type: {path}")]
    UnsupportedType { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// The path that failed.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::NotFound { path }
            | Self::PermissionDenied { path }
            | Self::UnsupportedType { path }
            | Self::Io { path, .. } => path,
        }
    }
}

/// Errors from enumerating a tree.
#[derive(Debug, Error)]
pub enum ListError {
    /// The tree root could not be opened. Fatal for the tree.
    #[error("Cannot open directory {path}: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A sub-directory could not be enumerated; its siblings were.
    #[error("Cannot list {path}: {message}")]
    Subtree { path: PathBuf, message: String },

    /// A name that is not valid UTF-8 was skipped.
    #[error("Skipping non UTF-8 name: {path}")]
    InvalidName { path: PathBuf },
}

/// Errors from applying one action to the destination tree.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Creating a directory (or one of its ancestors) failed.
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying file bytes failed.
    #[error("Failed to copy {path}: {source}")]
    CopyBytes {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Restoring permission bits or modification time failed.
    #[error("Failed to restore metadata on {path}: {source}")]
    RestoreMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An ancestor directory failed earlier in the run.
    #[error("Skipped {path}: parent directory {parent} could not be created")]
    ParentFailed { path: PathBuf, parent: String },
}

impl CopyError {
    /// The destination path the error refers to.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::CreateDirectory { path, .. }
            | Self::CopyBytes { path, .. }
            | Self::RestoreMetadata { path, .. }
            | Self::ParentFailed { path, .. } => path,
        }
    }
}

/// A worker thread or its channel could not be created.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The OS refused to start a thread.
    #[error("Failed to spawn worker {worker}: {source}")]
    Thread {
        worker: String,
        #[source]
        source: std::io::Error,
    },
}

/// A worker did not exit cleanly during pool teardown.
#[derive(Debug, Clone, Error)]
pub enum TeardownError {
    /// The worker thread panicked.
    #[error("Worker {worker} panicked")]
    Panicked { worker: String },
}

/// Errors from growing a registry.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Memory for a new entry could not be reserved.
    #[error("Out of memory while registering {path}")]
    AllocationFailed { path: String },
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid arguments or unusable roots.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// The worker pool could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// A tree root could not be listed.
    #[error(transparent)]
    List(#[from] ListError),

    /// A registry could not grow.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A worker died while results were still expected.
    #[error("Worker {worker} stopped unexpectedly")]
    WorkerLost { worker: String },

    /// Every worker hung up before all results were delivered.
    #[error("Worker channel closed with {missing} result(s) outstanding")]
    ChannelClosed { missing: usize },
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// A non-fatal, per-entry problem accumulated during a run.
#[derive(Debug)]
pub enum SyncIssue {
    /// Part of a tree could not be listed.
    List { side: TreeSide, error: ListError },
    /// An entry was skipped because it could not be probed.
    Probe { side: TreeSide, error: ProbeError },
    /// An action failed.
    Copy(CopyError),
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List { side, error } => write!(f, "[{side}] {error}"),
            Self::Probe { side, error } => write!(f, "[{side}] {error}"),
            Self::Copy(error) => write!(f, "[copy] {error}"),
        }
    }
}
