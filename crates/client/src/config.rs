//! Runtime configuration, optionally loaded from the environment.
//!
//! Nothing here is global: a [`Config`] is built once at program start
//! (usually via [`Config::from_env`]) and handed to `Fetcher::new`,
//! which constructs the chosen cache backend and starts the janitor.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use feedgrab_cache::DEFAULT_MAX_ENTRIES;
use feedgrab_cache::janitor::DEFAULT_INTERVAL;

/// File name used inside `SQLITE_PATH`.
pub const SQLITE_FILE_NAME: &str = "feedgrab-cache.db";

/// Which cache backend to construct.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Capped in-process map
    #[default]
    Memory,
    /// Embedded SQLite database; in-memory when no directory is given
    Sqlite { directory: Option<PathBuf> },
    /// Remote MySQL server
    MySql { user: String, password: String, database: String, host: String },
}

/// Everything `Fetcher::new` needs to wire a fetch stack together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cache backend selection
    pub backend: CacheBackend,
    /// Cap on stored cache entries (`CACHE_SIZE`)
    pub max_entries: usize,
    /// Pause between janitor trim passes (`CACHE_LIFESPAN`)
    pub janitor_interval: Duration,
    /// Disable TLS certificate verification (`IGNORE_SSL`)
    pub ignore_tls: bool,
    /// Treat the cache as serving a single end user, retaining
    /// `Cache-Control: private` pages
    pub private_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            max_entries: DEFAULT_MAX_ENTRIES,
            janitor_interval: DEFAULT_INTERVAL,
            ignore_tls: false,
            private_cache: false,
        }
    }
}

impl Config {
    /// Reads `CACHE`, `SQLITE_PATH`, `MYSQL_*`, `CACHE_SIZE`,
    /// `CACHE_LIFESPAN` and `IGNORE_SSL`. Malformed numbers fall back to
    /// their defaults; unknown `CACHE` values fall back to the in-memory
    /// backend.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        match env::var("CACHE").ok().as_deref() {
            Some("sqlite") => {
                config.backend = CacheBackend::Sqlite { directory: env::var_os("SQLITE_PATH").map(PathBuf::from) };
            }
            Some("mysql") => {
                config.backend = CacheBackend::MySql {
                    user: env::var("MYSQL_USER").unwrap_or_default(),
                    password: env::var("MYSQL_PWD").unwrap_or_default(),
                    database: env::var("MYSQL_DB").unwrap_or_default(),
                    host: env::var("MYSQL_HOST").unwrap_or_else(|_| "localhost".to_string()),
                };
            }
            Some(other) => warn!(value = other, "unknown CACHE backend, using in-memory"),
            None => {}
        }

        if let Some(size) = parse_env("CACHE_SIZE") {
            config.max_entries = size;
        }
        if let Some(seconds) = parse_env("CACHE_LIFESPAN") {
            config.janitor_interval = Duration::from_secs(seconds);
        }
        config.ignore_tls = env::var_os("IGNORE_SSL").is_some();

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(name, value, "ignoring unparseable environment variable");
            None
        }
    }
}
