use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use filetime::FileTime;
use tempfile::TempDir;
use treesync_core::{Entry, ProbeError, SyncConfig, SyncIssue, TreeSide};
use treesync_ops::{synchronize, synchronize_with, SyncAction, SyncReport};
use treesync_scan::{FsProber, Prober};

struct Fixture {
    _temp: TempDir,
    src: PathBuf,
    dst: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir(&src).unwrap();
        fs::create_dir(&dst).unwrap();
        Self {
            _temp: temp,
            src,
            dst,
        }
    }

    fn config(&self, parallel: bool) -> SyncConfig {
        SyncConfig::builder()
            .source(&self.src)
            .destination(&self.dst)
            .parallel(parallel)
            .workers(3usize)
            .build()
            .unwrap()
    }
}

fn write(root: &Path, relative: &str, contents: &str, mtime_secs: i64) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
}

fn action_paths(report: &SyncReport) -> Vec<&str> {
    report.actions.iter().map(SyncAction::path).collect()
}

#[test]
fn test_new_file_is_copied() {
    for parallel in [false, true] {
        let f = Fixture::new();
        write(&f.src, "a.txt", "0123456789", 1_000);

        let report = synchronize(&f.config(parallel)).unwrap();

        assert_eq!(action_paths(&report), vec!["a.txt"]);
        assert!(report.is_success());
        assert_eq!(report.files_copied, 1);
        assert_eq!(report.bytes_copied, 10);
        assert_eq!(fs::read_to_string(f.dst.join("a.txt")).unwrap(), "0123456789");
    }
}

#[test]
fn test_ancestors_created_before_files() {
    let f = Fixture::new();
    write(&f.src, "x/y/z.txt", "deep", 1_000);

    let report = synchronize(&f.config(true)).unwrap();

    assert_eq!(action_paths(&report), vec!["x", "x/y", "x/y/z.txt"]);
    assert!(matches!(report.actions[0], SyncAction::CreateDirectory(_)));
    assert_eq!(report.directories_created, 2);
    assert!(f.dst.join("x/y/z.txt").is_file());
}

#[test]
fn test_identical_file_is_left_alone() {
    let f = Fixture::new();
    write(&f.src, "a.txt", "same", 1_000);
    write(&f.dst, "a.txt", "same", 1_000);

    let report = synchronize(&f.config(true)).unwrap();
    assert!(report.actions.is_empty());
    assert_eq!(report.summary(), "Already in sync");
}

#[test]
fn test_existing_directory_is_not_recreated() {
    let f = Fixture::new();
    write(&f.src, "dir/a.txt", "a", 1_000);
    fs::create_dir(f.dst.join("dir")).unwrap();

    let report = synchronize(&f.config(false)).unwrap();
    assert_eq!(action_paths(&report), vec!["dir/a.txt"]);
    assert_eq!(report.directories_created, 0);
}

#[test]
fn test_destination_only_entries_survive() {
    let f = Fixture::new();
    write(&f.dst, "old.txt", "keep me", 1_000);

    let report = synchronize(&f.config(true)).unwrap();
    assert!(report.actions.is_empty());
    assert_eq!(report.destination_entries, 1);
    assert!(f.dst.join("old.txt").exists());
}

#[test]
fn test_size_and_time_only_misses_content_change() {
    let f = Fixture::new();
    write(&f.src, "a.txt", "aaaa", 1_000);
    write(&f.dst, "a.txt", "bbbb", 1_000);

    let mut config = f.config(true);
    config.hashing = false;
    let report = synchronize(&config).unwrap();
    assert!(report.actions.is_empty());
    assert_eq!(fs::read_to_string(f.dst.join("a.txt")).unwrap(), "bbbb");

    config.hashing = true;
    let report = synchronize(&config).unwrap();
    assert_eq!(action_paths(&report), vec!["a.txt"]);
    assert_eq!(fs::read_to_string(f.dst.join("a.txt")).unwrap(), "aaaa");
}

#[test]
fn test_second_run_is_a_no_op() {
    for parallel in [false, true] {
        let f = Fixture::new();
        write(&f.src, "a.txt", "a", 1_000);
        write(&f.src, "d/b.txt", "bb", 2_000);
        write(&f.src, "d/e/c.txt", "ccc", 3_000);
        write(&f.dst, "d/b.txt", "stale", 500);

        let first = synchronize(&f.config(parallel)).unwrap();
        assert!(first.is_success());
        assert!(!first.actions.is_empty());

        let second = synchronize(&f.config(parallel)).unwrap();
        assert!(second.actions.is_empty(), "parallel = {parallel}");
    }
}

#[test]
fn test_modes_agree_on_plan() {
    let f = Fixture::new();
    for i in 0..20 {
        write(&f.src, &format!("d{}/f{i}.txt", i % 4), &"x".repeat(i), 1_000 + i as i64);
    }
    write(&f.dst, "d1/f1.txt", "x", 1_001);
    write(&f.dst, "d2/f2.txt", "changed", 1_002);

    let mut config = f.config(true);
    config.dry_run = true;
    let parallel = synchronize(&config).unwrap();
    config.parallel = false;
    let sequential = synchronize(&config).unwrap();

    assert_eq!(parallel.actions, sequential.actions);
    assert!(!parallel.actions.iter().any(|a| a.path() == "d1/f1.txt"));
    assert!(parallel.actions.iter().any(|a| a.path() == "d2/f2.txt"));
}

#[test]
fn test_dry_run_changes_nothing() {
    let f = Fixture::new();
    write(&f.src, "a.txt", "new", 1_000);
    write(&f.src, "sub/b.txt", "b", 1_000);
    fs::remove_dir(&f.dst).unwrap();

    let mut config = f.config(true);
    config.dry_run = true;
    let report = synchronize(&config).unwrap();

    assert_eq!(action_paths(&report), vec!["a.txt", "sub", "sub/b.txt"]);
    assert_eq!(report.files_copied, 0);
    assert!(report.summary().starts_with("Would apply 3 actions"));
    assert!(!f.dst.exists());
}

#[test]
fn test_metadata_restored() {
    let f = Fixture::new();
    write(&f.src, "a.txt", "a", 1_234_567);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(f.src.join("a.txt"), fs::Permissions::from_mode(0o604)).unwrap();
    }

    synchronize(&f.config(false)).unwrap();

    let meta = fs::metadata(f.dst.join("a.txt")).unwrap();
    assert_eq!(
        meta.modified().unwrap(),
        UNIX_EPOCH + Duration::from_secs(1_234_567)
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        assert_eq!(meta.permissions().mode() & 0o7777, 0o604);
    }
}

#[test]
fn test_source_kind_wins() {
    let f = Fixture::new();
    write(&f.src, "x", "now a file", 1_000);
    write(&f.src, "y/inner.txt", "now a dir", 1_000);
    write(&f.dst, "x/old.txt", "was a dir", 1_000);
    write(&f.dst, "y", "was a file", 1_000);

    let report = synchronize(&f.config(true)).unwrap();

    assert!(report.is_success(), "{:?}", report.issues);
    assert_eq!(fs::read_to_string(f.dst.join("x")).unwrap(), "now a file");
    assert_eq!(
        fs::read_to_string(f.dst.join("y/inner.txt")).unwrap(),
        "now a dir"
    );
}

#[test]
fn test_read_only_destination_file_replaced() {
    let f = Fixture::new();
    write(&f.src, "ro.txt", "fresh", 2_000);
    write(&f.dst, "ro.txt", "stale", 1_000);
    let mut perms = fs::metadata(f.dst.join("ro.txt")).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(f.dst.join("ro.txt"), perms).unwrap();

    let report = synchronize(&f.config(false)).unwrap();
    assert!(report.is_success());
    assert_eq!(fs::read_to_string(f.dst.join("ro.txt")).unwrap(), "fresh");
}

/// Fails to probe one source path as if it vanished after listing.
struct VanishingProber {
    victim: &'static str,
}

impl Prober for VanishingProber {
    fn probe(&self, root: &Path, relative: &str) -> Result<Entry, ProbeError> {
        if relative == self.victim {
            return Err(ProbeError::NotFound {
                path: root.join(relative),
            });
        }
        FsProber::new(true).probe(root, relative)
    }
}

#[test]
fn test_probe_failure_skips_only_that_entry() {
    for parallel in [false, true] {
        let f = Fixture::new();
        write(&f.src, "a.txt", "a", 1_000);
        write(&f.src, "gone.txt", "g", 1_000);
        write(&f.src, "z.txt", "z", 1_000);

        let prober = Arc::new(VanishingProber { victim: "gone.txt" });
        let report = synchronize_with(&f.config(parallel), prober).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.issues.len(), 1);
        assert!(matches!(
            report.issues[0],
            SyncIssue::Probe {
                side: TreeSide::Source,
                ..
            }
        ));
        assert_eq!(action_paths(&report), vec!["a.txt", "z.txt"]);
        assert!(f.dst.join("z.txt").exists());
        assert!(!f.dst.join("gone.txt").exists());
    }
}

#[test]
fn test_missing_source_is_fatal() {
    let f = Fixture::new();
    fs::remove_dir(&f.src).unwrap();
    assert!(synchronize(&f.config(true)).is_err());
}

#[test]
fn test_nested_destination_rejected_without_side_effects() {
    let f = Fixture::new();
    write(&f.src, "a.txt", "a", 1_000);
    let inside = f.src.join("mirror/deep");

    for dry_run in [false, true] {
        let config = SyncConfig::builder()
            .source(&f.src)
            .destination(&inside)
            .dry_run(dry_run)
            .build()
            .unwrap();

        let err = synchronize(&config).unwrap_err();
        assert!(err.to_string().contains("contain each other"), "dry_run = {dry_run}");
        assert!(!f.src.join("mirror").exists());
    }
}

#[cfg(unix)]
#[test]
fn test_read_only_directory_accepts_later_files() {
    use std::os::unix::fs::PermissionsExt;

    let f = Fixture::new();
    fn set(path: &Path, mode: u32) {
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }
    write(&f.src, "ro/a.txt", "a", 1_000);
    set(&f.src.join("ro"), 0o555);

    let first = synchronize(&f.config(false)).unwrap();
    assert!(first.is_success(), "{:?}", first.issues);

    set(&f.src.join("ro"), 0o755);
    write(&f.src, "ro/b.txt", "b", 2_000);
    set(&f.src.join("ro"), 0o555);

    let second = synchronize(&f.config(false)).unwrap();
    let dst_mode = fs::metadata(f.dst.join("ro")).unwrap().permissions().mode() & 0o7777;
    set(&f.src.join("ro"), 0o755);
    set(&f.dst.join("ro"), 0o755);

    assert!(second.is_success(), "{:?}", second.issues);
    assert_eq!(action_paths(&second), vec!["ro/b.txt"]);
    assert_eq!(dst_mode, 0o555);
    assert_eq!(fs::read_to_string(f.dst.join("ro/b.txt")).unwrap(), "b");
}
