#[cfg(test)]
pub(crate) mod repository;
pub mod schema;

use std::path::Path;

use rusqlite::OpenFlags;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Database wraps a `tokio_rusqlite::Connection` onto the relationship store.
///
/// External stores are opened read-only and every query goes through
/// `read`, one `call` on the connection thread per operation. Only the
/// in-memory store built by `open_memory` keeps a writer, for loading
/// fixtures.
#[derive(Clone)]
pub struct Database {
    reader: tokio_rusqlite::Connection,
    writer: Option<tokio_rusqlite::Connection>,
}

impl Database {
    /// Open the store at the default path (`~/.schedkpi/schedule.db`).
    pub async fn open() -> Result<Self> {
        Self::open_at(crate::config::default_db_path()?).await
    }

    /// Open an existing store read-only. A missing or unreadable file is
    /// `StoreUnavailable`.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::StoreUnavailable(format!(
                "{}: no such file",
                path.display()
            )));
        }

        let reader = tokio_rusqlite::Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await?;

        let db = Self {
            reader,
            writer: None,
        };
        db.init_reader().await?;
        log::info!("opened {} read-only", path.display());
        Ok(db)
    }

    /// Open an in-memory store with the relationship schema applied (for
    /// testing and demos).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        writer
            .call(|conn| {
                let migrations = Migrations::new(vec![M::up(include_str!(
                    "migrations/001_relationships.sql"
                ))]);
                migrations.to_latest(conn).map_err(|e| e.to_string())?;
                Ok::<(), String>(())
            })
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;

        // In-memory databases are per-connection, so reader and writer share one.
        Ok(Self {
            reader: writer.clone(),
            writer: Some(writer),
        })
    }

    /// Touch the schema once so that a file which is not a database fails
    /// at open rather than on the first request.
    async fn init_reader(&self) -> Result<()> {
        self.read(|conn| {
            conn.execute_batch("PRAGMA busy_timeout=5000;")?;
            conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
                row.get::<_, i64>(0)
            })?;
            Ok(())
        })
        .await
    }

    /// Get a reference to the reader connection.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }

    /// Get a reference to the writer connection, if the store has one.
    #[cfg(test)]
    pub(crate) fn writer(&self) -> Result<&tokio_rusqlite::Connection> {
        self.writer
            .as_ref()
            .ok_or_else(|| Error::Database("store is opened read-only".into()))
    }

    pub fn is_read_only(&self) -> bool {
        self.writer.is_none()
    }

    /// Run `f` on the reader connection. Statement errors come back
    /// classified; a dead connection thread is `StoreUnavailable`.
    pub(crate) async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        self.reader
            .call(move |conn| Ok::<Result<T>, rusqlite::Error>(f(conn)))
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory() {
        let db = Database::open_memory().await.unwrap();

        let tables: Vec<String> = db
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            })
            .await
            .unwrap();

        assert!(tables.contains(&"ActivityRelationshipView".to_string()));
        assert!(tables.contains(&"PROJECT".to_string()));
        assert!(!db.is_read_only());
    }

    #[tokio::test]
    async fn test_missing_file_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = Database::open_at(dir.path().join("absent.db"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::StoreUnavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_garbage_file_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();
        let err = Database::open_at(&path).await.err().unwrap();
        assert!(matches!(err, Error::StoreUnavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_file_store_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1);")
                .unwrap();
        }

        let db = Database::open_at(&path).await.unwrap();
        assert!(db.is_read_only());
        assert!(db.writer().is_err());

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let err = db
            .read(|conn| Ok(conn.execute("INSERT INTO t VALUES (2)", [])?))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
