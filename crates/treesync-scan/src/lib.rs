//! Tree listing and metadata probing for treesync.
//!
//! # Overview
//!
//! `treesync-scan` turns a directory tree into entries in two steps:
//!
//! - **Listing** walks the tree with jwalk and yields relative paths of
//!   every regular file and directory, streaming them to a callback.
//! - **Probing** reads one path's kind, mode, size, modification time and,
//!   optionally, its BLAKE3 content hash.
//!
//! Sub-directories that cannot be read are reported and skipped; the rest
//! of the walk carries on.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treesync_scan::{list_tree, FsProber, Prober};
//!
//! let root = Path::new("/path/to/tree");
//! let listing = list_tree(root).unwrap();
//! let prober = FsProber::new(true);
//!
//! for path in &listing.paths {
//!     match prober.probe(root, path) {
//!         Ok(entry) => println!("{} {:o}", entry.path, entry.mode),
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! ```

mod lister;
mod probe;

pub use lister::{list_tree, walk_tree, walk_tree_until, TreeListing, WalkSummary};
pub use probe::{hash_file, FsProber, Prober};

// Re-export core types for convenience
pub use treesync_core::{ContentHash, Entry, EntryKind, ListError, ProbeError};
