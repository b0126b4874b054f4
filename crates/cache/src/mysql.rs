//! Remote SQL cache backend on MySQL.
//!
//! Unlike the SQLite backend there is no long-lived shared handle: a
//! connection is opened per operation with autocommit on, which keeps the
//! store trivially safe across threads at the cost of a handshake per
//! call. Fine for a cache that sits behind a network fetch anyway.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder};
use tracing::warn;

use crate::error::CacheError;
use crate::record::CacheRecord;
use crate::store::CacheStore;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS data \
    (url VARCHAR(255) NOT NULL PRIMARY KEY, code INT, msg TEXT, headers TEXT, data BLOB, timestamp INT)";

const UPSERT: &str = "INSERT INTO data VALUES (?, ?, ?, ?, ?, ?) \
    ON DUPLICATE KEY UPDATE code=VALUES(code), msg=VALUES(msg), headers=VALUES(headers), \
    data=VALUES(data), timestamp=VALUES(timestamp)";

const SELECT: &str = "SELECT code, msg, headers, data, timestamp FROM data WHERE url=?";

const TRIM: &str = "DELETE FROM data WHERE timestamp <= \
    (SELECT timestamp FROM (SELECT timestamp FROM data ORDER BY timestamp DESC LIMIT 1 OFFSET ?) newest)";

/// Cache store backed by a MySQL server.
#[derive(Debug)]
pub struct MySqlStore {
    opts: Opts,
    max_entries: usize,
}

impl MySqlStore {
    /// Connects, creates the table if missing and trims once.
    pub fn connect(
        user: &str,
        password: &str,
        database: &str,
        host: &str,
        max_entries: usize,
    ) -> Result<Self, CacheError> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(host))
            .user(Some(user))
            .pass(Some(password))
            .db_name(Some(database));
        let store = Self { opts: Opts::from(opts), max_entries };

        store.conn()?.query_drop(CREATE_TABLE)?;
        store.trim();
        Ok(store)
    }

    fn conn(&self) -> Result<Conn, mysql::Error> {
        Conn::new(self.opts.clone())
    }
}

impl CacheStore for MySqlStore {
    fn get(&self, url: &str) -> Option<CacheRecord> {
        let row = self.conn().and_then(|mut conn| {
            conn.exec_first::<(u16, String, String, Vec<u8>, u64), _, _>(SELECT, (url,))
        });

        match row {
            Ok(row) => row.map(|(status, reason, headers, body, timestamp)| CacheRecord {
                status,
                reason,
                headers,
                body,
                timestamp,
            }),
            Err(e) => {
                warn!(url, error = %e, "mysql cache read failed, treating as miss");
                None
            }
        }
    }

    fn set(&self, url: &str, record: CacheRecord) {
        let result = self.conn().and_then(|mut conn| {
            conn.exec_drop(
                UPSERT,
                (url, record.status, record.reason, record.headers, record.body, record.timestamp),
            )
        });
        if let Err(e) = result {
            warn!(url, error = %e, "mysql cache write failed");
        }
    }

    fn trim(&self) {
        let result = self.conn().and_then(|mut conn| conn.exec_drop(TRIM, (self.max_entries,)));
        if let Err(e) = result {
            warn!(error = %e, "mysql cache trim failed");
        }
    }
}
