//! Folder scanning and streaming CRC32 hashing.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{LibraryError, LibraryStore};

/// Read size per hashing step. Cancellation is observed at this granularity.
const CHUNK_SIZE: usize = 8 * 1024;

/// Result of a folder scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Every checksum present under the scanned root, cached or fresh.
    pub checksums: HashSet<String>,
    /// Video files encountered.
    pub files_seen: u64,
    /// Files hashed in this run.
    pub hashed: u64,
    /// Files served from the cache without a read.
    pub cached: u64,
    /// Files skipped because they could not be read or resolved.
    pub skipped: u64,
    /// Whether the scan stopped early on cancellation.
    pub interrupted: bool,
}

/// Whether a path carries one of the allowed video extensions.
fn has_video_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Stream-hash a file with CRC32.
///
/// Returns `Ok(None)` when cancellation interrupted the read; partial hashes
/// are never returned.
fn hash_file(path: &Path, cancel: &CancellationToken) -> std::io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(Some(format!("{:08X}", hasher.finalize())))
}

/// Walk `root` and produce the set of checksums of every video file under it.
///
/// Unchanged files are served from the cache without touching the disk; fresh
/// hashes are committed to the store one file at a time. Unreadable files are
/// skipped with a warning and do not abort the scan.
pub fn scan_folder(
    store: &dyn LibraryStore,
    root: &Path,
    extensions: &[String],
    cancel: &CancellationToken,
) -> Result<ScanOutcome, LibraryError> {
    let mut outcome = ScanOutcome::default();

    for entry in WalkDir::new(root).follow_links(true) {
        if cancel.is_cancelled() {
            outcome.interrupted = true;
            break;
        }

        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                outcome.skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_file() || !has_video_extension(entry.path(), extensions) {
            continue;
        }
        outcome.files_seen += 1;

        // Canonical key: symlinks resolved, absolute. The same physical file
        // always lands on the same row.
        let path = match entry.path().canonicalize() {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Cannot resolve path, skipping");
                outcome.skipped += 1;
                continue;
            }
        };

        if let Some(crc32) = store.lookup(&path)? {
            debug!(path = %path.display(), crc32 = %crc32, "Cache hit");
            outcome.checksums.insert(crc32);
            outcome.cached += 1;
            continue;
        }

        debug!(path = %path.display(), "Hashing");
        match hash_file(&path, cancel) {
            Ok(Some(crc32)) => {
                store.insert(&path, &crc32)?;
                outcome.checksums.insert(crc32);
                outcome.hashed += 1;
            }
            Ok(None) => {
                // Interrupted mid-file; nothing is cached for it.
                outcome.interrupted = true;
                break;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read file, skipping");
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

/// Count video files under `root` and how many are already catalogued.
pub fn count_video_files(
    store: &dyn LibraryStore,
    root: &Path,
    extensions: &[String],
) -> Result<(u64, u64), LibraryError> {
    let mut total = 0u64;
    let mut recorded = 0u64;

    for entry in WalkDir::new(root).follow_links(true).into_iter().flatten() {
        if !entry.file_type().is_file() || !has_video_extension(entry.path(), extensions) {
            continue;
        }
        total += 1;
        if let Ok(path) = entry.path().canonicalize() {
            if store.lookup(&path)?.is_some() {
                recorded += 1;
            }
        }
    }

    Ok((total, recorded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::SqliteLibrary;
    use std::fs;

    fn exts() -> Vec<String> {
        vec!["mkv".to_string(), "mp4".to_string(), "avi".to_string()]
    }

    fn write_file(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_scan_hashes_video_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ep1.mkv", b"hello world");
        write_file(dir.path(), "notes.txt", b"not a video");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();
        let outcome = scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();

        assert_eq!(outcome.files_seen, 1);
        assert_eq!(outcome.hashed, 1);
        assert_eq!(outcome.cached, 0);
        assert!(!outcome.interrupted);
        // CRC32 of "hello world"
        assert!(outcome.checksums.contains("0D4A1185"));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ep1.MKV", b"data");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();
        let outcome = scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();

        assert_eq!(outcome.files_seen, 1);
        assert_eq!(outcome.hashed, 1);
    }

    #[test]
    fn test_second_scan_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ep1.mkv", b"hello world");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();

        let first = scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();
        assert_eq!(first.hashed, 1);

        let second = scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();
        assert_eq!(second.hashed, 0);
        assert_eq!(second.cached, 1);
        assert_eq!(second.checksums, first.checksums);
    }

    #[test]
    fn test_relative_path_spellings_share_cache_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("season-1");
        fs::create_dir(&sub).unwrap();
        write_file(&sub, "ep1.mkv", b"hello world");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();

        let direct = scan_folder(&lib, &sub, &exts(), &cancel).unwrap();
        let dotted = sub.join("..").join("season-1");
        let via_dots = scan_folder(&lib, &dotted, &exts(), &cancel).unwrap();

        assert_eq!(direct.checksums, via_dots.checksums);
        assert_eq!(via_dots.hashed, 0);
        assert_eq!(lib.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_recursive_scan() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        write_file(dir.path(), "top.mkv", b"one");
        write_file(&nested, "deep.mp4", b"two");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();
        let outcome = scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();

        assert_eq!(outcome.files_seen, 2);
        assert_eq!(outcome.checksums.len(), 2);
    }

    #[test]
    fn test_cancelled_before_start_hashes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ep1.mkv", b"hello world");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();
        assert!(outcome.interrupted);
        assert_eq!(outcome.hashed, 0);
        assert!(lib.entries().unwrap().is_empty());
    }

    #[test]
    fn test_interrupted_file_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "ep1.mkv", b"some bytes");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let hashed = hash_file(&path, &cancel).unwrap();
        assert!(hashed.is_none());
    }

    #[test]
    fn test_count_video_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ep1.mkv", b"one");
        write_file(dir.path(), "ep2.mkv", b"two");

        let lib = SqliteLibrary::in_memory().unwrap();
        let cancel = CancellationToken::new();

        let (total, recorded) = count_video_files(&lib, dir.path(), &exts()).unwrap();
        assert_eq!((total, recorded), (2, 0));

        scan_folder(&lib, dir.path(), &exts(), &cancel).unwrap();

        let (total, recorded) = count_video_files(&lib, dir.path(), &exts()).unwrap();
        assert_eq!((total, recorded), (2, 2));
    }
}
