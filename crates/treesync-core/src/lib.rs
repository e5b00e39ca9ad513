//! Core types for treesync.
//!
//! This crate provides the data structures shared by the scanning, worker
//! pool and operations crates: discovered entries, the ordered per-tree
//! registry, run configuration and the error taxonomy.

mod config;
mod entry;
mod error;
mod registry;

pub use config::{SyncConfig, SyncConfigBuilder, SyncConfigBuilderError, TimePrecision};
pub use entry::{join_relative, ContentHash, Entry, EntryKind, TreeSide};
pub use error::{
    CopyError, ListError, ProbeError, RegistryError, SpawnError, SyncError, SyncIssue,
    TeardownError,
};
pub use registry::{EntryRegistry, Inserted};
