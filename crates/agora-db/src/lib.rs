pub mod cascade;
pub mod counters;
pub mod error;
pub mod migrations;
pub mod models;
pub mod pagination;
pub mod queries;

pub use error::{Result, StoreError};
pub use pagination::{PAGE_SIZE, Page};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

const READER_POOL_SIZE: usize = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite handle with a single writer and a round-robin pool of read-only
/// connections. All multi-row mutations go through [`Database::with_tx`].
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        writer.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Private in-memory database. Reads share the writer connection since
    /// a second connection would see a different database.
    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        if self.readers.is_empty() {
            return self.with_conn_mut(f);
        }

        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside a write transaction. Commits on `Ok`, rolls back when
    /// `f` returns an error (the transaction is dropped uncommitted).
    pub fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Timestamp format stored in every `created_at` column. Fixed width, so
/// lexical order is chronological order.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agora.db");

        let (post_id, liker_id) = {
            let db = Database::open(&path).unwrap();
            let owner = db.create_user("owner", "owner@example.com", "hash").unwrap();
            let liker = db.create_user("liker", "liker@example.com", "hash").unwrap();
            let post = db.create_post(&owner.id, "persisted").unwrap();
            db.create_comment(&post.id, &liker.id, "nice").unwrap();
            db.create_like(&post.id, &liker.id).unwrap();
            db.set_post_archived(&post.id, true).unwrap();
            db.set_profile_archived(&owner.id, true).unwrap();
            (post.id, liker.id)
        };

        let db = Database::open(&path).unwrap();
        let post = db.get_post(&post_id).unwrap().unwrap();
        assert!(post.post_is_archived);
        assert_eq!((post.post_like_count, post.post_comment_count), (1, 1));
        assert!(db.get_like(&post_id, &liker_id).unwrap().is_some());

        let owner = db.get_user_by_username("owner").unwrap().unwrap();
        assert!(owner.profile_is_archived);
    }

    #[test]
    fn readers_see_writes_and_reject_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("agora.db")).unwrap();

        let mode: String = db
            .with_conn_mut(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(mode, "wal");

        let user = db.create_user("reader", "reader@example.com", "hash").unwrap();
        for _ in 0..READER_POOL_SIZE {
            assert!(db.get_user_by_id(&user.id).unwrap().is_some());
            let write = db.with_conn(|conn| Ok(conn.execute("DELETE FROM users", [])?));
            assert!(matches!(write, Err(StoreError::Storage(_))));
        }
        assert!(db.get_user_by_id(&user.id).unwrap().is_some());
    }
}
