//! SQLite-backed library store implementation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{LibraryEntry, LibraryError, LibraryStore};

/// SQLite-backed checksum cache.
pub struct SqliteLibrary {
    conn: Mutex<Connection>,
}

impl SqliteLibrary {
    /// Open (or create) the library database at `path`.
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        let conn = Connection::open(path).map_err(|e| LibraryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory library (useful for testing).
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LibraryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LibraryError> {
        conn.execute_batch(
            r#"
            -- One row per catalogued file, keyed by canonical path
            CREATE TABLE IF NOT EXISTS crc32_cache (
                file_path TEXT PRIMARY KEY,
                crc32 TEXT NOT NULL
            );

            -- Run metadata (timestamps, last folder)
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;

        Ok(())
    }
}

impl LibraryStore for SqliteLibrary {
    fn lookup(&self, path: &Path) -> Result<Option<String>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT crc32 FROM crc32_cache WHERE file_path = ?",
            params![path.to_string_lossy()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LibraryError::Database(e.to_string()))
    }

    fn insert(&self, path: &Path, crc32: &str) -> Result<(), LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO crc32_cache (file_path, crc32) VALUES (?, ?)",
            params![path.to_string_lossy(), crc32],
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;
        Ok(())
    }

    fn update_path(&self, old: &Path, new: &Path) -> Result<(), LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE crc32_cache SET file_path = ? WHERE file_path = ?",
            params![new.to_string_lossy(), old.to_string_lossy()],
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LibraryEntry>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT file_path, crc32 FROM crc32_cache ORDER BY rowid")
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let path: String = row.get(0)?;
                let crc32: String = row.get(1)?;
                Ok(LibraryEntry {
                    path: path.into(),
                    crc32,
                })
            })
            .map_err(|e| LibraryError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| LibraryError::Database(e.to_string()))?);
        }
        Ok(entries)
    }

    fn metadata_get(&self, key: &str) -> Result<Option<String>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM metadata WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LibraryError::Database(e.to_string()))
    }

    fn metadata_set(&self, key: &str, value: &str) -> Result<(), LibraryError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            params![key, value],
        )
        .map_err(|e| LibraryError::Database(e.to_string()))?;
        Ok(())
    }
}
