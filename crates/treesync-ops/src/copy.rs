//! Copy applier: executes planned actions against the destination tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use filetime::FileTime;
use tracing::{debug, info, warn};

use treesync_core::{CopyError, EntryKind};

use crate::diff::SyncAction;

/// Result of applying a list of actions.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// Directories created or replaced.
    pub directories_created: usize,
    /// Files copied.
    pub files_copied: usize,
    /// Bytes written to the destination.
    pub bytes_copied: u64,
    /// Per-entry failures.
    pub errors: Vec<CopyError>,
}

impl ApplyOutcome {
    /// Check if every action succeeded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies [`SyncAction`]s, mapping relative paths from the source root to
/// the destination root.
#[derive(Debug, Clone)]
pub struct CopyApplier {
    source_root: PathBuf,
    destination_root: PathBuf,
    dry_run: bool,
}

impl CopyApplier {
    /// Create an applier for one pair of roots.
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            dry_run: false,
        }
    }

    /// Only log the actions instead of applying them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply `actions` in order.
    ///
    /// Actions must be in ascending path order so that a directory is
    /// handled before anything beneath it. A failed directory fails every
    /// later action beneath it without touching the filesystem, and so does
    /// a parent that was never planned (its source entry could not be
    /// probed). Any other failure is recorded and the next action is
    /// attempted.
    ///
    /// Existing destination directories without owner write permission are
    /// made writable while their children are updated and get their mode
    /// back at the end.
    pub fn apply(&self, actions: &[SyncAction]) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        if self.dry_run {
            for action in actions {
                info!(action = %action, "Dry run, not applied");
            }
            return outcome;
        }

        let mut failed_dirs: Vec<CompactString> = Vec::new();
        // Modes are applied last, deepest first, so read-only directories
        // can still be filled.
        let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();

        for action in actions {
            let entry = action.entry();
            let target = entry.absolute(&self.destination_root);

            if let Some(parent) = failed_dirs.iter().find(|dir| entry.is_beneath(dir)) {
                debug!(path = %entry.path, parent = %parent, "Parent failed, skipping");
                outcome.errors.push(CopyError::ParentFailed {
                    path: target,
                    parent: parent.to_string(),
                });
                if entry.is_dir() {
                    failed_dirs.push(entry.path.clone());
                }
                continue;
            }

            if let Some((parent, _)) = entry.path.rsplit_once('/') {
                if !target.parent().is_some_and(Path::is_dir) {
                    debug!(path = %entry.path, parent, "Parent missing, skipping");
                    outcome.errors.push(CopyError::ParentFailed {
                        path: target,
                        parent: parent.to_string(),
                    });
                    if entry.is_dir() {
                        failed_dirs.push(entry.path.clone());
                    }
                    continue;
                }
            }

            if let Some(parent) = target.parent() {
                match unlock_directory(parent) {
                    Ok(Some(mode)) => {
                        debug!(path = %parent.display(), "Parent made writable");
                        dir_modes.push((parent.to_path_buf(), mode));
                    }
                    Ok(None) => {}
                    Err(source) => {
                        outcome.errors.push(CopyError::RestoreMetadata {
                            path: parent.to_path_buf(),
                            source,
                        });
                    }
                }
            }

            match action {
                SyncAction::CreateDirectory(_) => match ensure_directory(&target) {
                    Ok(()) => {
                        debug!(path = %entry.path, "Directory ready");
                        outcome.directories_created += 1;
                        dir_modes.push((target, entry.mode));
                    }
                    Err(e) => {
                        warn!(error = %e, "Directory failed");
                        failed_dirs.push(entry.path.clone());
                        outcome.errors.push(e);
                    }
                },
                SyncAction::CopyFile(_) => {
                    let EntryKind::File { modified, .. } = entry.kind else {
                        continue;
                    };
                    let source = entry.absolute(&self.source_root);
                    let copied = copy_bytes(&source, &target)
                        .and_then(|bytes| {
                            restore_metadata(&target, entry.mode, modified).map(|()| bytes)
                        });
                    match copied {
                        Ok(bytes) => {
                            debug!(path = %entry.path, bytes, "File copied");
                            outcome.files_copied += 1;
                            outcome.bytes_copied += bytes;
                        }
                        Err(e) => {
                            warn!(error = %e, "Copy failed");
                            outcome.errors.push(e);
                        }
                    }
                }
            }
        }

        for (path, mode) in dir_modes.into_iter().rev() {
            if let Err(source) = set_mode(&path, mode) {
                outcome
                    .errors
                    .push(CopyError::RestoreMetadata { path, source });
            }
        }

        outcome
    }
}

/// Make sure `path` is a directory, creating missing ancestors.
///
/// Idempotent. A non-directory already at `path` is removed first.
pub fn ensure_directory(path: &Path) -> Result<(), CopyError> {
    let create_err = |source| CopyError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            debug!(path = %path.display(), "Replacing non-directory");
            fs::remove_file(path).map_err(create_err)?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(create_err(e)),
    }

    fs::create_dir_all(path).map_err(create_err)
}

/// Copy the bytes of `source` to `destination`, returning the byte count.
///
/// Whatever occupies `destination` is replaced if it is a directory, a
/// symbolic link or a read-only file.
pub fn copy_bytes(source: &Path, destination: &Path) -> Result<u64, CopyError> {
    let copy_err = |source| CopyError::CopyBytes {
        path: destination.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.is_dir() => {
            debug!(path = %destination.display(), "Replacing directory with file");
            fs::remove_dir_all(destination).map_err(copy_err)?;
        }
        Ok(meta) if meta.file_type().is_symlink() || meta.permissions().readonly() => {
            fs::remove_file(destination).map_err(copy_err)?;
        }
        _ => {}
    }

    fs::copy(source, destination).map_err(copy_err)
}

/// Set the permission bits and modification time of `path`.
pub fn restore_metadata(path: &Path, mode: u32, modified: SystemTime) -> Result<(), CopyError> {
    let restore_err = |source| CopyError::RestoreMetadata {
        path: path.to_path_buf(),
        source,
    };

    filetime::set_file_mtime(path, FileTime::from_system_time(modified)).map_err(restore_err)?;
    set_mode(path, mode).map_err(restore_err)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Add owner write to an existing directory that lacks it.
///
/// Returns the previous mode when it was changed.
#[cfg(unix)]
fn unlock_directory(path: &Path) -> io::Result<Option<u32>> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode() & 0o7777;
    if mode & 0o200 != 0 {
        return Ok(None);
    }
    set_mode(path, mode | 0o200)?;
    Ok(Some(mode))
}

#[cfg(not(unix))]
fn unlock_directory(_path: &Path) -> io::Result<Option<u32>> {
    Ok(None)
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions)
}
