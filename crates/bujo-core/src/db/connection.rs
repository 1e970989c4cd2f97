//! Database connection management

use std::path::Path;

use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};

use super::migrations;
use crate::error::Result;

/// Shared SQLite handle for the local event, snapshot and settings tables
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        Self::configure(&conn)?;
        migrations::run(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Configure `SQLite` for optimal performance
    fn configure(conn: &Connection) -> Result<()> {
        // WAL is unavailable for in-memory databases; ignore the result there.
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Lock the underlying connection
    pub async fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection().await;
        let one: i32 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("bujo.db");

        let db = Database::open(&path).unwrap();
        drop(db);

        assert!(path.exists());
    }
}
