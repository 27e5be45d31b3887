//! Episode index - the persistent catalogue of remotely published episodes.
//!
//! Rows are keyed by checksum. Re-indexing the same checksum replaces the
//! row, so the index always reflects the most recent listing pass.

mod sqlite;

pub use sqlite::SqliteIndex;

use thiserror::Error;

use crate::release::QualityFilter;

/// One indexed episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub crc32: String,
    pub title: String,
    pub page_link: String,
    pub magnet_link: Option<String>,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for the episode index store.
pub trait EpisodeIndex: Send + Sync {
    /// Insert or replace a batch of records, returning how many were written.
    /// Within the batch, a repeated checksum keeps the last occurrence.
    fn upsert(&self, records: &[EpisodeRecord]) -> Result<usize, IndexError>;

    /// Title of the indexed episode with this checksum, if any.
    fn title_for(&self, crc32: &str) -> Result<Option<String>, IndexError>;

    /// All indexed episodes in insertion order, optionally restricted to
    /// titles passing a quality filter.
    fn load_all(&self, filter: Option<&QualityFilter>) -> Result<Vec<EpisodeRecord>, IndexError>;

    /// Attach a magnet link to an already-indexed episode.
    fn set_magnet(&self, crc32: &str, magnet: &str) -> Result<(), IndexError>;

    /// Run metadata value for a key.
    fn metadata_get(&self, key: &str) -> Result<Option<String>, IndexError>;

    /// Insert or replace a run metadata value.
    fn metadata_set(&self, key: &str, value: &str) -> Result<(), IndexError>;
}
