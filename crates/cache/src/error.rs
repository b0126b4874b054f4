//! Error type for cache backend construction.
//!
//! Once a store is running, read/write/trim failures are logged and
//! degrade to cache misses (the cache is advisory); only opening a
//! backend surfaces errors to the caller.

use thiserror::Error;

/// Failure to open or initialise a storage backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The embedded SQLite database could not be opened or initialised
    #[error("sqlite cache error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// The MySQL server could not be reached or initialised
    #[error("mysql cache error: {source}")]
    MySql {
        #[from]
        source: mysql::Error,
    },
}
