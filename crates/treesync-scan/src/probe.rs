//! Metadata prober: stat plus optional BLAKE3 content hash.

use std::fs::{self, File, Metadata};
use std::io::Read;
use std::path::Path;

use blake3::Hasher;
use tracing::trace;

use treesync_core::{join_relative, ContentHash, Entry, ProbeError};

/// Files larger than this are hashed through a memory map.
const MMAP_THRESHOLD: u64 = 128 * 1024;

/// Reads one entry's metadata.
///
/// Implementations must be shareable across analyzer threads.
pub trait Prober: Send + Sync {
    /// Probe `relative` under `root` and build its entry.
    fn probe(&self, root: &Path, relative: &str) -> Result<Entry, ProbeError>;
}

/// Prober backed by the local filesystem.
#[derive(Debug, Clone, Copy)]
pub struct FsProber {
    hashing: bool,
}

impl FsProber {
    /// Create a prober; `hashing` enables content hashes for files.
    pub fn new(hashing: bool) -> Self {
        Self { hashing }
    }
}

impl Default for FsProber {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Prober for FsProber {
    fn probe(&self, root: &Path, relative: &str) -> Result<Entry, ProbeError> {
        let path = join_relative(root, relative);
        let metadata = fs::metadata(&path).map_err(|e| ProbeError::io(&path, e))?;
        let mode = get_mode(&metadata);

        if metadata.is_dir() {
            trace!(path = %path.display(), "Probed directory");
            return Ok(Entry::directory(relative, mode));
        }

        if !metadata.is_file() {
            return Err(ProbeError::UnsupportedType { path });
        }

        let modified = metadata.modified().map_err(|e| ProbeError::io(&path, e))?;
        let hash = if self.hashing {
            Some(hash_file(&path).map_err(|e| ProbeError::io(&path, e))?)
        } else {
            None
        };

        trace!(path = %path.display(), size = metadata.len(), "Probed file");
        Ok(Entry::file(relative, mode, metadata.len(), modified, hash))
    }
}

/// Compute the full BLAKE3 hash of a file.
pub fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();

    let mut hasher = Hasher::new();
    if file_size > MMAP_THRESHOLD {
        hasher.update_mmap(path)?;
    } else {
        let mut buffer = vec![0u8; 64 * 1024];
        let mut file = file;
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
    }

    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Permission bits of an entry.
#[cfg(unix)]
fn get_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn get_mode(metadata: &Metadata) -> u32 {
    match (metadata.is_dir(), metadata.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use treesync_core::EntryKind;

    #[test]
    fn test_probe_file_with_hash() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "0123456789").unwrap();

        let entry = FsProber::new(true).probe(temp.path(), "a.txt").unwrap();
        assert_eq!(entry.path, "a.txt");
        match entry.kind {
            EntryKind::File { size, hash, .. } => {
                assert_eq!(size, 10);
                assert_eq!(hash, Some(ContentHash::new(*blake3::hash(b"0123456789").as_bytes())));
            }
            EntryKind::Directory => panic!("expected a file"),
        }
    }

    #[test]
    fn test_probe_without_hashing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "x").unwrap();

        let entry = FsProber::new(false).probe(temp.path(), "a.txt").unwrap();
        assert!(matches!(entry.kind, EntryKind::File { hash: None, .. }));
    }

    #[test]
    fn test_probe_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("d")).unwrap();

        let entry = FsProber::default().probe(temp.path(), "d").unwrap();
        assert!(entry.is_dir());
    }

    #[test]
    fn test_probe_vanished_path() {
        let temp = TempDir::new().unwrap();
        let err = FsProber::default().probe(temp.path(), "gone").unwrap_err();
        assert!(matches!(err, ProbeError::NotFound { .. }));
    }

    #[test]
    fn test_hash_large_file_matches_buffered() {
        let temp = TempDir::new().unwrap();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let path = temp.path().join("big.bin");
        fs::write(&path, &data).unwrap();

        let hash = hash_file(&path).unwrap();
        assert_eq!(hash, ContentHash::new(*blake3::hash(&data).as_bytes()));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_fifo_is_unsupported() {
        let temp = TempDir::new().unwrap();
        let fifo = temp.path().join("fifo");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !matches!(status, Ok(s) if s.success()) {
            return;
        }

        let err = FsProber::default().probe(temp.path(), "fifo").unwrap_err();
        assert!(matches!(err, ProbeError::UnsupportedType { .. }));
    }
}
