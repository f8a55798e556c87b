//! Repository pattern for the local blob store.

use crate::db::error::DbError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

type Result<T> = std::result::Result<T, DbError>;

/// Synchronous key/value blob storage.
pub trait BlobStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, blob: &str) -> Result<()>;
}

/// SQLite implementation of the blob store.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![super::schema::SCHEMA_VERSION],
        )?;
        Ok(())
    }
}

impl BlobStore for SqliteRepository {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let blob = self
            .conn
            .query_row(
                "SELECT blob FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob)
    }

    fn write(&self, key: &str, blob: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, blob, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at",
            params![key, blob, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_key_returns_none() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        assert_eq!(repo.read("app_state").unwrap(), None);
    }

    #[test]
    fn write_then_overwrite() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.write("app_state", "{\"a\":1}").unwrap();
        repo.write("app_state", "{\"a\":2}").unwrap();
        assert_eq!(repo.read("app_state").unwrap().as_deref(), Some("{\"a\":2}"));
    }

    #[test]
    fn keys_are_independent() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.write("one", "1").unwrap();
        repo.write("two", "2").unwrap();
        assert_eq!(repo.read("one").unwrap().as_deref(), Some("1"));
        assert_eq!(repo.read("two").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn reopen_is_idempotent() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.initialize().unwrap();
        let version: i32 = repo
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, crate::db::schema::SCHEMA_VERSION);
    }
}
