//! Top-level synchronization run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use treesync_core::{EntryRegistry, SyncConfig, SyncError, SyncIssue, TreeSide};
use treesync_pool::WorkerPool;
use treesync_scan::{list_tree, FsProber, Prober};

use crate::copy::CopyApplier;
use crate::diff::{diff_registries, DiffOptions};
use crate::report::SyncReport;

/// Bring `config.destination` in line with `config.source`.
///
/// Fatal problems (unusable roots, worker spawn failures, an unlistable
/// root) abort with a [`SyncError`]. Everything else is collected in the
/// report's issues. In parallel mode the worker pool is torn down before
/// this returns, whatever the outcome.
pub fn synchronize(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    synchronize_with(config, Arc::new(FsProber::new(config.hashing)))
}

/// [`synchronize`] with a custom metadata prober.
pub fn synchronize_with(
    config: &SyncConfig,
    prober: Arc<dyn Prober>,
) -> Result<SyncReport, SyncError> {
    let destination_present = prepare_roots(config)?;

    info!(
        source = %config.source.display(),
        destination = %config.destination.display(),
        parallel = config.parallel,
        workers = config.workers,
        hashing = config.hashing,
        dry_run = config.dry_run,
        "Synchronizing"
    );

    let mut report = SyncReport {
        dry_run: config.dry_run,
        ..SyncReport::default()
    };

    let (source, destination) = if !destination_present {
        debug!("Destination missing, planning against an empty tree");
        let source = build_registry_sequential(
            &config.source,
            TreeSide::Source,
            prober.as_ref(),
            &mut report.issues,
        )?;
        (source, EntryRegistry::new())
    } else if config.parallel {
        build_registries_parallel(config, prober, &mut report)?
    } else {
        let source = build_registry_sequential(
            &config.source,
            TreeSide::Source,
            prober.as_ref(),
            &mut report.issues,
        )?;
        let destination = build_registry_sequential(
            &config.destination,
            TreeSide::Destination,
            prober.as_ref(),
            &mut report.issues,
        )?;
        (source, destination)
    };

    report.source_entries = source.len();
    report.destination_entries = destination.len();

    let actions = diff_registries(&source, &destination, &DiffOptions::from(config));
    debug!(actions = actions.len(), "Diff complete");

    let outcome = CopyApplier::new(&config.source, &config.destination)
        .with_dry_run(config.dry_run)
        .apply(&actions);
    report.record_apply(outcome);
    report.actions = actions;

    info!(summary = %report.summary(), "Synchronization finished");
    Ok(report)
}

/// Build one tree's registry on the calling thread.
///
/// The listing is sorted and de-duplicated before probing, so entries can
/// be appended at the tail. Listing and probe problems are pushed to
/// `issues`; only an unopenable root is an error.
pub fn build_registry_sequential(
    root: &Path,
    side: TreeSide,
    prober: &dyn Prober,
    issues: &mut Vec<SyncIssue>,
) -> Result<EntryRegistry, SyncError> {
    let listing = list_tree(root)?;
    issues.extend(
        listing
            .errors
            .into_iter()
            .map(|error| SyncIssue::List { side, error }),
    );

    let mut paths = listing.paths;
    paths.sort_unstable();
    paths.dedup();

    let mut registry = EntryRegistry::with_capacity(paths.len());
    for path in &paths {
        match prober.probe(root, path) {
            Ok(entry) => registry.append_tail(entry)?,
            Err(error) => {
                warn!(%side, error = %error, "Skipping entry");
                issues.push(SyncIssue::Probe { side, error });
            }
        }
    }

    debug!(%side, entries = registry.len(), "Registry built");
    Ok(registry)
}

fn build_registries_parallel(
    config: &SyncConfig,
    prober: Arc<dyn Prober>,
    report: &mut SyncReport,
) -> Result<(EntryRegistry, EntryRegistry), SyncError> {
    let mut pool = WorkerPool::start(config, prober)?;
    let gathered = pool.gather();
    report.teardown = pool.shutdown();

    let gathered = gathered?;
    report.issues.extend(gathered.issues);
    Ok((gathered.source, gathered.destination))
}

/// Check both roots before any work starts.
///
/// Nothing is created until every check that does not need the
/// destination to exist has passed. The destination is then created if
/// missing, except in dry-run mode. Returns whether the destination exists
/// afterwards.
fn prepare_roots(config: &SyncConfig) -> Result<bool, SyncError> {
    let source = &config.source;
    let destination = &config.destination;

    let meta = fs::metadata(source).map_err(|e| {
        SyncError::config(format!("Cannot access source {}: {e}", source.display()))
    })?;
    if !meta.is_dir() {
        return Err(SyncError::config(format!(
            "Source {} is not a directory",
            source.display()
        )));
    }

    let present = match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => true,
        Ok(_) => {
            return Err(SyncError::config(format!(
                "Destination {} is not a directory",
                destination.display()
            )));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            return Err(SyncError::config(format!(
                "Cannot access destination {}: {e}",
                destination.display()
            )));
        }
    };

    let (src_abs, dst_abs) = match (source.canonicalize(), resolve_lenient(destination)) {
        (Ok(s), Ok(d)) => (s, d),
        _ => return Err(SyncError::config("Cannot resolve source or destination path")),
    };
    if src_abs.starts_with(&dst_abs) || dst_abs.starts_with(&src_abs) {
        return Err(SyncError::config(
            "Source and destination must not contain each other",
        ));
    }

    if !present {
        if config.dry_run {
            return Ok(false);
        }
        info!(path = %destination.display(), "Creating destination");
        fs::create_dir_all(destination).map_err(|e| {
            SyncError::config(format!(
                "Cannot create destination {}: {e}",
                destination.display()
            ))
        })?;
    }

    if !is_directory_writable(destination) {
        return Err(SyncError::config(format!(
            "Destination {} is not writable",
            destination.display()
        )));
    }

    Ok(true)
}

/// Canonical form of a path that may not exist yet.
///
/// The nearest existing ancestor is canonicalized and the missing tail is
/// appended lexically.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    while fs::symlink_metadata(existing).is_err() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for name in tail.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Whether a file can be created in `dir`.
///
/// Probes by creating and removing a temporary file, which accounts for
/// ACLs, read-only mounts and the like.
pub fn is_directory_writable(dir: &Path) -> bool {
    tempfile::Builder::new()
        .prefix(".treesync-probe")
        .tempfile_in(dir)
        .is_ok()
}
