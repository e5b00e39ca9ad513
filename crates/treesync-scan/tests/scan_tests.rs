use std::fs;

use tempfile::TempDir;
use treesync_scan::{list_tree, walk_tree, FsProber, ListError, Prober};

fn create_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir(root.join("locked")).unwrap();
    fs::write(root.join("a/b/one.txt"), "one").unwrap();
    fs::write(root.join("a/two.txt"), "two").unwrap();
    fs::write(root.join("locked/secret.txt"), "secret").unwrap();
    fs::write(root.join("top.txt"), "top").unwrap();
    temp
}

#[test]
fn test_walk_streams_every_entry() {
    let temp = create_tree();
    let mut streamed = Vec::new();
    let summary = walk_tree(temp.path(), |p| streamed.push(p)).unwrap();

    assert_eq!(summary.discovered, streamed.len());
    assert_eq!(streamed.len(), 7);
    assert!(!summary.stopped);
}

#[test]
fn test_every_listed_path_probes() {
    let temp = create_tree();
    let listing = list_tree(temp.path()).unwrap();
    let prober = FsProber::new(true);

    for path in &listing.paths {
        let entry = prober.probe(temp.path(), path).unwrap();
        assert_eq!(entry.path, *path);
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_subtree_is_reported_not_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_tree();
    let locked = temp.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users read through mode bits; nothing to observe then.
    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let listing = list_tree(temp.path()).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(listing.paths.iter().any(|p| p == "locked"));
    assert!(listing.paths.iter().any(|p| p == "top.txt"));
    assert!(listing.paths.iter().any(|p| p == "a/b/one.txt"));
    assert!(!listing.paths.iter().any(|p| p == "locked/secret.txt"));
    assert!(
        listing
            .errors
            .iter()
            .any(|e| matches!(e, ListError::Subtree { .. }))
    );
}
