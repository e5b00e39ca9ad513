//! JWalk-based tree lister.

use std::fs;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use treesync_core::ListError;

/// Outcome of a streaming walk.
#[derive(Debug, Default)]
pub struct WalkSummary {
    /// Number of paths handed to the callback.
    pub discovered: usize,
    /// Sub-trees that could not be listed, and skipped names.
    pub errors: Vec<ListError>,
    /// Whether the walk ended early because it was asked to stop.
    pub stopped: bool,
}

/// Paths collected by [`list_tree`], in traversal order (not sorted).
#[derive(Debug, Default)]
pub struct TreeListing {
    /// Relative paths of every file and directory under the root.
    pub paths: Vec<CompactString>,
    /// Sub-trees that could not be listed, and skipped names.
    pub errors: Vec<ListError>,
}

impl TreeListing {
    /// Check if every part of the tree was listed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// List every file and directory under `root`.
///
/// The root itself is not included. Fails only if the root cannot be
/// opened; unreadable sub-directories end up in [`TreeListing::errors`].
pub fn list_tree(root: &Path) -> Result<TreeListing, ListError> {
    let mut paths = Vec::new();
    let summary = walk_tree(root, |path| paths.push(path))?;
    Ok(TreeListing {
        paths,
        errors: summary.errors,
    })
}

/// Walk `root`, calling `on_path` with each relative path as it is found.
pub fn walk_tree<F>(root: &Path, on_path: F) -> Result<WalkSummary, ListError>
where
    F: FnMut(CompactString),
{
    let never = AtomicBool::new(false);
    walk_tree_until(root, &never, on_path)
}

/// Like [`walk_tree`], but returns early once `stop` is raised.
pub fn walk_tree_until<F>(
    root: &Path,
    stop: &AtomicBool,
    mut on_path: F,
) -> Result<WalkSummary, ListError>
where
    F: FnMut(CompactString),
{
    // Surface an unusable root as a hard failure before walking.
    fs::read_dir(root).map_err(|source| ListError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;

    let walker = WalkDir::new(root)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .min_depth(1);

    let mut summary = WalkSummary::default();

    for entry_result in walker {
        if stop.load(Ordering::Relaxed) {
            debug!(root = %root.display(), "Walk stopped early");
            summary.stopped = true;
            break;
        }

        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                warn!(path = %path.display(), error = %err, "Cannot list sub-tree");
                summary.errors.push(ListError::Subtree {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };

        let file_type = entry.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        match relative_key(root, &path) {
            Some(key) => {
                summary.discovered += 1;
                on_path(key);
            }
            None => {
                warn!(path = %path.display(), "Skipping non UTF-8 name");
                summary.errors.push(ListError::InvalidName { path });
            }
        }
    }

    debug!(
        root = %root.display(),
        discovered = summary.discovered,
        errors = summary.errors.len(),
        "Walk finished"
    );

    Ok(summary)
}

/// `/`-joined path of `path` relative to `root`, or `None` if any
/// component is not valid UTF-8.
fn relative_key(root: &Path, path: &Path) -> Option<CompactString> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = CompactString::default();
    for component in relative.components() {
        let Component::Normal(name) = component else {
            continue;
        };
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(name.to_str()?);
    }
    if key.is_empty() { None } else { Some(key) }
}
