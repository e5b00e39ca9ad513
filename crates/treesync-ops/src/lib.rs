//! Synchronization engine for treesync.
//!
//! This crate turns two trees into a plan and carries it out:
//!
//! - [`diff_registries`] merges the source and destination registries and
//!   produces the ordered list of [`SyncAction`]s
//! - [`CopyApplier`] executes those actions against the destination tree
//! - [`synchronize`] runs the whole pipeline for one [`SyncConfig`] and
//!   returns a [`SyncReport`]
//!
//! [`SyncConfig`]: treesync_core::SyncConfig

mod copy;
mod diff;
mod engine;
mod report;

pub use copy::{copy_bytes, ensure_directory, restore_metadata, ApplyOutcome, CopyApplier};
pub use diff::{diff_registries, mismatch, DiffOptions, SyncAction};
pub use engine::{
    build_registry_sequential, is_directory_writable, synchronize, synchronize_with,
};
pub use report::SyncReport;
