//! Local video library - a persistent path -> checksum cache.
//!
//! Files are hashed once and trusted indefinitely; the cache key is the
//! canonicalized absolute path so the same physical file is never hashed
//! twice regardless of how it is referenced.

mod scanner;
mod sqlite;

pub use scanner::{scan_folder, count_video_files, ScanOutcome};
pub use sqlite::SqliteLibrary;

use std::path::{Path, PathBuf};

use thiserror::Error;

/// One cached (path, checksum) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub path: PathBuf,
    pub crc32: String,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for the local checksum cache.
pub trait LibraryStore: Send + Sync {
    /// Cached checksum for a path, if any.
    fn lookup(&self, path: &Path) -> Result<Option<String>, LibraryError>;

    /// Insert or replace a (path, checksum) pair. The write is committed
    /// immediately so a crash mid-scan loses at most the in-progress file.
    fn insert(&self, path: &Path, crc32: &str) -> Result<(), LibraryError>;

    /// Re-key an entry after a rename. The cache must never keep a stale
    /// path pointing at a file that no longer exists there.
    fn update_path(&self, old: &Path, new: &Path) -> Result<(), LibraryError>;

    /// All cached entries, in insertion order.
    fn entries(&self) -> Result<Vec<LibraryEntry>, LibraryError>;

    /// Run metadata value for a key.
    fn metadata_get(&self, key: &str) -> Result<Option<String>, LibraryError>;

    /// Insert or replace a run metadata value.
    fn metadata_set(&self, key: &str, value: &str) -> Result<(), LibraryError>;
}
