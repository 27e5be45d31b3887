//! SQLite-backed episode index implementation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{EpisodeIndex, EpisodeRecord, IndexError};
use crate::release::QualityFilter;

pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Open (or create) the index database at `path`.
    pub fn new(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path).map_err(|e| IndexError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self, IndexError> {
        let conn =
            Connection::open_in_memory().map_err(|e| IndexError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), IndexError> {
        conn.execute_batch(
            r#"
            -- One row per published episode, keyed by checksum
            CREATE TABLE IF NOT EXISTS episodes_index (
                crc32 TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                page_link TEXT NOT NULL,
                magnet_link TEXT
            );

            -- Run metadata (refresh timestamps)
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )
        .map_err(|e| IndexError::Database(e.to_string()))?;

        Ok(())
    }
}

impl EpisodeIndex for SqliteIndex {
    fn upsert(&self, records: &[EpisodeRecord]) -> Result<usize, IndexError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::Database(e.to_string()))?;

        for record in records {
            tx.execute(
                "INSERT OR REPLACE INTO episodes_index (crc32, title, page_link, magnet_link)
                 VALUES (?, ?, ?, ?)",
                params![
                    record.crc32,
                    record.title,
                    record.page_link,
                    record.magnet_link
                ],
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;
        }

        tx.commit().map_err(|e| IndexError::Database(e.to_string()))?;
        Ok(records.len())
    }

    fn title_for(&self, crc32: &str) -> Result<Option<String>, IndexError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT title FROM episodes_index WHERE crc32 = ?",
            params![crc32],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| IndexError::Database(e.to_string()))
    }

    fn load_all(&self, filter: Option<&QualityFilter>) -> Result<Vec<EpisodeRecord>, IndexError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT crc32, title, page_link, magnet_link FROM episodes_index ORDER BY rowid",
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(EpisodeRecord {
                    crc32: row.get(0)?,
                    title: row.get(1)?,
                    page_link: row.get(2)?,
                    magnet_link: row.get(3)?,
                })
            })
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let record = row.map_err(|e| IndexError::Database(e.to_string()))?;
            if let Some(filter) = filter {
                if !filter.accepts(&record.title) {
                    continue;
                }
            }
            records.push(record);
        }
        Ok(records)
    }

    fn set_magnet(&self, crc32: &str, magnet: &str) -> Result<(), IndexError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE episodes_index SET magnet_link = ? WHERE crc32 = ?",
            params![magnet, crc32],
        )
        .map_err(|e| IndexError::Database(e.to_string()))?;
        Ok(())
    }

    fn metadata_get(&self, key: &str) -> Result<Option<String>, IndexError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM metadata WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| IndexError::Database(e.to_string()))
    }

    fn metadata_set(&self, key: &str, value: &str) -> Result<(), IndexError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            params![key, value],
        )
        .map_err(|e| IndexError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(crc32: &str, title: &str) -> EpisodeRecord {
        EpisodeRecord {
            crc32: crc32.to_string(),
            title: title.to_string(),
            page_link: format!("https://nyaa.si/view/{crc32}"),
            magnet_link: None,
        }
    }

    #[test]
    fn test_upsert_and_title_for() {
        let index = SqliteIndex::in_memory().unwrap();

        let written = index
            .upsert(&[record("AAAAAAAA", "[One Pace][1-7] Romance Dawn 01 [1080p][AAAAAAAA]")])
            .unwrap();
        assert_eq!(written, 1);

        assert_eq!(
            index.title_for("AAAAAAAA").unwrap().as_deref(),
            Some("[One Pace][1-7] Romance Dawn 01 [1080p][AAAAAAAA]")
        );
        assert!(index.title_for("BBBBBBBB").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let index = SqliteIndex::in_memory().unwrap();

        index.upsert(&[record("AAAAAAAA", "old title")]).unwrap();
        index.upsert(&[record("AAAAAAAA", "new title")]).unwrap();

        assert_eq!(index.title_for("AAAAAAAA").unwrap().as_deref(), Some("new title"));
        assert_eq!(index.load_all(None).unwrap().len(), 1);
    }

    #[test]
    fn test_load_all_in_insertion_order() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .upsert(&[
                record("AAAAAAAA", "first"),
                record("BBBBBBBB", "second"),
                record("CCCCCCCC", "third"),
            ])
            .unwrap();

        let all = index.load_all(None).unwrap();
        let checksums: Vec<&str> = all.iter().map(|r| r.crc32.as_str()).collect();
        assert_eq!(checksums, vec!["AAAAAAAA", "BBBBBBBB", "CCCCCCCC"]);
    }

    #[test]
    fn test_load_all_applies_quality_filter() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .upsert(&[
                record("AAAAAAAA", "[One Pace] Episode 1 [1080p][AAAAAAAA]"),
                record("BBBBBBBB", "[One Pace] Episode 2 [480p][BBBBBBBB]"),
                record("CCCCCCCC", "[One Pace] Episode 3 [720p][CCCCCCCC]"),
            ])
            .unwrap();

        let filter = QualityFilter::default();
        let filtered = index.load_all(Some(&filter)).unwrap();
        let checksums: Vec<&str> = filtered.iter().map(|r| r.crc32.as_str()).collect();
        assert_eq!(checksums, vec!["AAAAAAAA", "CCCCCCCC"]);
    }

    #[test]
    fn test_set_magnet() {
        let index = SqliteIndex::in_memory().unwrap();
        index.upsert(&[record("AAAAAAAA", "episode")]).unwrap();

        index
            .set_magnet("AAAAAAAA", "magnet:?xt=urn:btih:abc")
            .unwrap();

        let all = index.load_all(None).unwrap();
        assert_eq!(
            all[0].magnet_link.as_deref(),
            Some("magnet:?xt=urn:btih:abc")
        );
    }

    #[test]
    fn test_metadata_roundtrip() {
        let index = SqliteIndex::in_memory().unwrap();

        assert!(index.metadata_get("episodes_db_last_update").unwrap().is_none());
        index
            .metadata_set("episodes_db_last_update", "2026-08-26T10:00:00Z")
            .unwrap();
        assert_eq!(
            index.metadata_get("episodes_db_last_update").unwrap().as_deref(),
            Some("2026-08-26T10:00:00Z")
        );
    }

    #[test]
    fn test_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");

        {
            let index = SqliteIndex::new(&db_path).unwrap();
            index.upsert(&[record("AAAAAAAA", "episode")]).unwrap();
        }

        let index = SqliteIndex::new(&db_path).unwrap();
        assert_eq!(index.title_for("AAAAAAAA").unwrap().as_deref(), Some("episode"));
    }
}
