//! Key/value repository implementation

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for key/value storage operations
pub trait KvRepository {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; returns whether it existed
    fn delete(&self, key: &str) -> Result<bool>;
}

/// `SQLite` implementation of `KvRepository`
pub struct SqliteKvRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteKvRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl KvRepository for SqliteKvRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_missing_key_is_none() {
        let db = setup();
        let repo = SqliteKvRepository::new(db.connection());
        assert_eq!(repo.get("offline_records").unwrap(), None);
    }

    #[test]
    fn test_set_replaces_value() {
        let db = setup();
        let repo = SqliteKvRepository::new(db.connection());

        repo.set("offline_records", "[]").unwrap();
        repo.set("offline_records", "[1]").unwrap();

        assert_eq!(repo.get("offline_records").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let repo = SqliteKvRepository::new(db.connection());

        repo.set("sync_conflicts", "[]").unwrap();
        assert!(repo.delete("sync_conflicts").unwrap());
        assert!(!repo.delete("sync_conflicts").unwrap());
        assert_eq!(repo.get("sync_conflicts").unwrap(), None);
    }
}
