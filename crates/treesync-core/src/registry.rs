//! Ordered, de-duplicated registry of the entries of one tree.

use std::slice;

use crate::entry::Entry;
use crate::error::RegistryError;

/// Outcome of [`EntryRegistry::insert_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted<'a> {
    /// The entry was added.
    New(&'a Entry),
    /// An entry with the same path was already present; it is kept and the
    /// new one is dropped.
    AlreadyExists(&'a Entry),
}

impl<'a> Inserted<'a> {
    /// The entry now stored under the path.
    pub fn entry(&self) -> &'a Entry {
        match self {
            Self::New(entry) | Self::AlreadyExists(entry) => entry,
        }
    }

    /// Whether this call added the entry.
    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Entries of one tree, in strictly increasing byte order of their path.
///
/// Entries are write-once: the registry hands out shared references only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRegistry {
    entries: Vec<Entry>,
}

impl EntryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert an entry at its sorted position.
    ///
    /// Arrival order does not matter. If the path is already present the
    /// first inserted entry wins and is returned as [`Inserted::AlreadyExists`].
    pub fn insert_ordered(&mut self, entry: Entry) -> Result<Inserted<'_>, RegistryError> {
        match self.position(&entry.path) {
            Ok(index) => Ok(Inserted::AlreadyExists(&self.entries[index])),
            Err(index) => {
                self.entries
                    .try_reserve(1)
                    .map_err(|_| RegistryError::AllocationFailed {
                        path: entry.path.to_string(),
                    })?;
                self.entries.insert(index, entry);
                Ok(Inserted::New(&self.entries[index]))
            }
        }
    }

    /// Append an entry after the current last one.
    ///
    /// The caller guarantees that `entry.path` sorts after every path
    /// already stored. This is not checked; breaking it corrupts the order
    /// that [`iter`](Self::iter) and later merges rely on.
    pub fn append_tail(&mut self, entry: Entry) -> Result<(), RegistryError> {
        self.entries
            .try_reserve(1)
            .map_err(|_| RegistryError::AllocationFailed {
                path: entry.path.to_string(),
            })?;
        self.entries.push(entry);
        Ok(())
    }

    /// Look up an entry by its relative path.
    pub fn find_by_path(&self, path: &str) -> Option<&Entry> {
        self.position(path).ok().map(|index| &self.entries[index])
    }

    /// Check whether a path is present.
    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_ok()
    }

    /// Entries in ascending path order.
    pub fn iter(&self) -> slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Entries in descending path order.
    pub fn iter_rev(&self) -> std::iter::Rev<slice::Iter<'_, Entry>> {
        self.entries.iter().rev()
    }

    /// Paths in ascending order.
    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.path.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every entry. Safe on an empty registry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, path: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|probe| probe.path.as_str().cmp(path))
    }
}

impl<'a> IntoIterator for &'a EntryRegistry {
    type Item = &'a Entry;
    type IntoIter = slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
