//! Embedded SQL cache backend on SQLite.
//!
//! A single connection is shared across request threads behind a mutex;
//! the database runs in WAL journal mode so concurrent readers in other
//! processes are not blocked by writes.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::error::CacheError;
use crate::record::CacheRecord;
use crate::store::CacheStore;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS data \
    (url TEXT PRIMARY KEY, code INT, msg TEXT, headers TEXT, data BLOB, timestamp INT)";

const UPSERT: &str = "INSERT INTO data VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
    ON CONFLICT(url) DO UPDATE SET code=?2, msg=?3, headers=?4, data=?5, timestamp=?6";

const SELECT: &str = "SELECT code, msg, headers, data, timestamp FROM data WHERE url=?1";

// keep the rows whose timestamp is among the `max_entries` newest
const TRIM: &str = "DELETE FROM data WHERE timestamp <= \
    (SELECT timestamp FROM (SELECT timestamp FROM data ORDER BY timestamp DESC LIMIT 1 OFFSET ?1))";

/// Cache store backed by an SQLite database file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path, max_entries: usize) -> Result<Self, CacheError> {
        Self::from_connection(Connection::open(path)?, max_entries)
    }

    /// Opens a private in-memory database, useful when no cache directory
    /// is configured.
    pub fn open_in_memory(max_entries: usize) -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?, max_entries)
    }

    fn from_connection(conn: Connection, max_entries: usize) -> Result<Self, CacheError> {
        // in-memory databases report their own journal mode; not fatal
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!(error = %e, "could not enable WAL journal mode");
        }
        conn.execute(CREATE_TABLE, [])?;
        let store = Self { conn: Mutex::new(conn), max_entries };
        store.trim();
        Ok(store)
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, url: &str) -> Option<CacheRecord> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let row = conn
            .query_row(SELECT, params![url], |row| {
                Ok(CacheRecord {
                    status: row.get(0)?,
                    reason: row.get(1)?,
                    headers: row.get(2)?,
                    body: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })
            .optional();

        match row {
            Ok(record) => record,
            Err(e) => {
                warn!(url, error = %e, "sqlite cache read failed, treating as miss");
                None
            }
        }
    }

    fn set(&self, url: &str, record: CacheRecord) {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let result = conn.execute(
            UPSERT,
            params![url, record.status, record.reason, record.headers, record.body, record.timestamp],
        );
        if let Err(e) = result {
            warn!(url, error = %e, "sqlite cache write failed");
        }
    }

    fn trim(&self) {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        if let Err(e) = conn.execute(TRIM, params![self.max_entries]) {
            warn!(error = %e, "sqlite cache trim failed");
        }
    }
}
