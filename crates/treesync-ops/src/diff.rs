//! Merge-diff of two entry registries.

use std::cmp::Ordering;
use std::fmt;

use humansize::{format_size, BINARY};
use tracing::trace;

use treesync_core::{Entry, EntryKind, EntryRegistry, SyncConfig, TimePrecision};

/// One step needed to bring the destination in line with the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Create the directory (and any missing ancestors).
    CreateDirectory(Entry),
    /// Copy the file and restore its mode and modification time.
    CopyFile(Entry),
}

impl SyncAction {
    /// Action that materializes a source entry at the destination.
    pub fn for_entry(entry: &Entry) -> Self {
        match entry.kind {
            EntryKind::Directory => Self::CreateDirectory(entry.clone()),
            EntryKind::File { .. } => Self::CopyFile(entry.clone()),
        }
    }

    /// The source entry this action materializes.
    pub fn entry(&self) -> &Entry {
        match self {
            Self::CreateDirectory(entry) | Self::CopyFile(entry) => entry,
        }
    }

    /// Relative path of the entry.
    pub fn path(&self) -> &str {
        &self.entry().path
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDirectory(entry) => write!(f, "mkdir {}/", entry.path),
            Self::CopyFile(entry) => write!(
                f,
                "copy  {} ({})",
                entry.path,
                format_size(entry.size().unwrap_or(0), BINARY)
            ),
        }
    }
}

/// What counts as a difference between two entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Compare content hashes as well as size and time.
    pub hashing: bool,
    /// Precision for modification times.
    pub precision: TimePrecision,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            hashing: true,
            precision: TimePrecision::default(),
        }
    }
}

impl From<&SyncConfig> for DiffOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            hashing: config.hashing,
            precision: config.time_precision,
        }
    }
}

/// Whether the destination entry must be replaced by the source entry.
///
/// Entries of different kinds always mismatch. Directories never mismatch
/// each other. Files mismatch on size, on modification time at the
/// configured precision, and on content hash when hashing is enabled.
pub fn mismatch(source: &Entry, destination: &Entry, options: &DiffOptions) -> bool {
    match (&source.kind, &destination.kind) {
        (EntryKind::Directory, EntryKind::Directory) => false,
        (
            EntryKind::File {
                size: src_size,
                modified: src_time,
                hash: src_hash,
            },
            EntryKind::File {
                size: dst_size,
                modified: dst_time,
                hash: dst_hash,
            },
        ) => {
            src_size != dst_size
                || !options.precision.same(*src_time, *dst_time)
                || (options.hashing && src_hash != dst_hash)
        }
        _ => true,
    }
}

/// Walk both registries in path order and list what must be copied.
///
/// Source-only entries and mismatched pairs produce an action; entries
/// present only in the destination are left alone. The result is in
/// ascending path order, so every directory precedes its descendants.
pub fn diff_registries(
    source: &EntryRegistry,
    destination: &EntryRegistry,
    options: &DiffOptions,
) -> Vec<SyncAction> {
    let mut actions = Vec::new();
    let mut src = source.iter().peekable();
    let mut dst = destination.iter().peekable();

    loop {
        match (src.peek().copied(), dst.peek().copied()) {
            (None, None) => break,
            (None, Some(d)) => {
                trace!(path = %d.path, "Destination only");
                dst.next();
            }
            (Some(s), None) => {
                actions.push(SyncAction::for_entry(s));
                src.next();
            }
            (Some(s), Some(d)) => match s.path.as_str().cmp(d.path.as_str()) {
                Ordering::Equal => {
                    if mismatch(s, d, options) {
                        actions.push(SyncAction::for_entry(s));
                    }
                    src.next();
                    dst.next();
                }
                Ordering::Less => {
                    actions.push(SyncAction::for_entry(s));
                    src.next();
                }
                Ordering::Greater => {
                    trace!(path = %d.path, "Destination only");
                    dst.next();
                }
            },
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use treesync_core::ContentHash;

    fn at(secs: u64, nanos: u32) -> SystemTime {
        UNIX_EPOCH + Duration::new(secs, nanos)
    }

    fn file(path: &str, size: u64, modified: SystemTime, hash: u8) -> Entry {
        Entry::file(path, 0o644, size, modified, Some(ContentHash::new([hash; 32])))
    }

    fn registry(entries: Vec<Entry>) -> EntryRegistry {
        let mut registry = EntryRegistry::new();
        for entry in entries {
            registry.insert_ordered(entry).unwrap();
        }
        registry
    }

    fn paths(actions: &[SyncAction]) -> Vec<&str> {
        actions.iter().map(SyncAction::path).collect()
    }

    #[test]
    fn test_identical_files_match() {
        let a = file("a.txt", 10, at(100, 5), 1);
        assert!(!mismatch(&a, &a.clone(), &DiffOptions::default()));
    }

    #[test]
    fn test_each_field_alone_causes_mismatch() {
        let options = DiffOptions::default();
        let base = file("a.txt", 10, at(100, 0), 1);

        assert!(mismatch(&base, &file("a.txt", 11, at(100, 0), 1), &options));
        assert!(mismatch(&base, &file("a.txt", 10, at(101, 0), 1), &options));
        assert!(mismatch(&base, &file("a.txt", 10, at(100, 0), 2), &options));
    }

    #[test]
    fn test_hash_ignored_without_hashing() {
        let options = DiffOptions {
            hashing: false,
            ..DiffOptions::default()
        };
        let a = file("a.txt", 10, at(100, 0), 1);
        let b = file("a.txt", 10, at(100, 0), 2);
        assert!(!mismatch(&a, &b, &options));
    }

    #[test]
    fn test_time_precision() {
        let a = file("a.txt", 10, at(100, 1_000), 1);
        let b = file("a.txt", 10, at(100, 999_000_000), 1);

        assert!(!mismatch(&a, &b, &DiffOptions::default()));
        let millis = DiffOptions {
            precision: TimePrecision::Millis,
            ..DiffOptions::default()
        };
        assert!(mismatch(&a, &b, &millis));
    }

    #[test]
    fn test_kind_difference_mismatches() {
        let dir = Entry::directory("x", 0o755);
        let f = file("x", 0, at(0, 0), 0);
        let options = DiffOptions::default();

        assert!(mismatch(&dir, &f, &options));
        assert!(mismatch(&f, &dir, &options));
        assert!(!mismatch(&dir, &Entry::directory("x", 0o700), &options));
    }

    #[test]
    fn test_merge_interleaved() {
        let t = at(100, 0);
        let src = registry(vec![
            file("a", 1, t, 1),
            file("c", 1, t, 1),
            file("d", 2, t, 1),
            file("f", 1, t, 1),
        ]);
        let dst = registry(vec![
            file("b", 1, t, 1),
            file("c", 1, t, 1),
            file("d", 1, t, 1),
            file("e", 1, t, 1),
        ]);

        let actions = diff_registries(&src, &dst, &DiffOptions::default());
        assert_eq!(paths(&actions), vec!["a", "d", "f"]);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let t = at(100, 0);
        let src = registry(vec![
            Entry::directory("d", 0o755),
            file("d/x", 1, t, 1),
            file("d/y", 2, t, 2),
            file("e", 3, t, 3),
        ]);
        let dst = registry(vec![file("d/x", 1, t, 9), file("e", 3, t, 3), file("z", 1, t, 1)]);
        let options = DiffOptions::default();

        let first = diff_registries(&src, &dst, &options);
        let second = diff_registries(&src, &dst, &options);
        assert_eq!(first, second);
        assert_eq!(paths(&first), vec!["d", "d/x", "d/y"]);
    }

    #[test]
    fn test_empty_source_does_nothing() {
        let dst = registry(vec![file("old.txt", 3, at(1, 0), 1)]);
        assert!(diff_registries(&EntryRegistry::new(), &dst, &DiffOptions::default()).is_empty());
    }

    #[test]
    fn test_actions_split_by_kind() {
        let src = registry(vec![
            Entry::directory("dir", 0o755),
            file("dir/a.txt", 10, at(1, 0), 1),
        ]);
        let actions = diff_registries(&src, &EntryRegistry::new(), &DiffOptions::default());

        assert!(matches!(actions[0], SyncAction::CreateDirectory(_)));
        assert!(matches!(actions[1], SyncAction::CopyFile(_)));
        assert_eq!(actions[1].to_string(), "copy  dir/a.txt (10 B)");
    }
}
