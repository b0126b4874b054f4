//! HTTP fetching for feed retrieval: a middleware pipeline around plain
//! GETs that hands back decoded bytes with a known charset, follows the
//! informal redirects buried in HTML (meta refresh, alternate links),
//! and serves bodies out of a conditional cache with pluggable storage.
//!
//! ```no_run
//! use feedgrab_client::{Config, FetchOptions, Fetcher};
//!
//! let fetcher = Fetcher::new(Config::default())?;
//! let result = fetcher.adv_get("https://example.com/feed.xml", &FetchOptions::default())?;
//! println!("{} bytes of {} ({})", result.body.len(), result.content_type, result.encoding);
//! # Ok::<(), feedgrab_client::FetchError>(())
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod sanitize;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use feedgrab_cache::{CacheStore, Janitor, MemoryStore, MySqlStore, SqliteStore};

pub use config::{CacheBackend, Config};
pub use encoding::detect_encoding;
pub use error::FetchError;
pub use handler::{CachePolicy, FollowTarget};
pub use response::Response;
pub use sanitize::sanitize_url;
pub use transport::{HttpTransport, Transport};

use handler::{
    AlternateLink, BrowserlyHeaders, EncodingFix, Gzip, Handler, HttpCache, HttpEquiv, Refresh,
    SizeLimit, UserAgent,
};
use pipeline::Pipeline;
use request::Request;

/// Per-call knobs for [`Fetcher::get`] and [`Fetcher::adv_get`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Socket-level timeout; `None` leaves the transport default
    pub timeout: Option<Duration>,
    /// Steer HTML landing pages towards this document family
    pub follow: Option<FollowTarget>,
    /// Cache aggressiveness
    pub policy: CachePolicy,
    /// Charset override; detected when `None`
    pub encoding: Option<String>,
}

/// Everything a fetch produced.
#[derive(Debug)]
pub struct FetchResult {
    /// Decoded body bytes
    pub body: Bytes,
    /// Final URL after redirects
    pub url: String,
    /// MIME type with parameters stripped
    pub content_type: String,
    /// Detected charset label
    pub encoding: String,
    /// The final response, for out-of-band inspection
    pub response: Response,
}

/// A configured fetch stack: cache store, transport and janitor.
///
/// Cheap to share behind an `Arc`; every call builds its own pipeline,
/// so concurrent fetches only meet at the cache store.
pub struct Fetcher {
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    private_cache: bool,
    _janitor: Janitor,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher").field("private_cache", &self.private_cache).finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Builds the cache backend and transport described by `config` and
    /// starts the trim janitor.
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let store: Arc<dyn CacheStore> = match &config.backend {
            CacheBackend::Memory => Arc::new(MemoryStore::new(config.max_entries)),
            CacheBackend::Sqlite { directory: Some(dir) } => {
                Arc::new(SqliteStore::open(&dir.join(config::SQLITE_FILE_NAME), config.max_entries)?)
            }
            CacheBackend::Sqlite { directory: None } => {
                Arc::new(SqliteStore::open_in_memory(config.max_entries)?)
            }
            CacheBackend::MySql { user, password, database, host } => {
                Arc::new(MySqlStore::connect(user, password, database, host, config.max_entries)?)
            }
        };
        debug!(backend = ?config.backend, max_entries = config.max_entries, "cache backend ready");

        let transport = Arc::new(HttpTransport::new(config.ignore_tls)?);
        Self::assemble(store, transport, &config)
    }

    /// [`Fetcher::new`] over [`Config::from_env`].
    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(Config::from_env())
    }

    /// Wires a fetcher from pre-built parts. This is the seam embedders
    /// (and the test suite) use to supply their own transport or store.
    pub fn with_parts(
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
        config: &Config,
    ) -> Result<Self, FetchError> {
        Self::assemble(store, transport, config)
    }

    fn assemble(
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
        config: &Config,
    ) -> Result<Self, FetchError> {
        let janitor = Janitor::start(
            Arc::downgrade(&store),
            config.janitor_interval,
        );
        Ok(Self { store, transport, private_cache: config.private_cache, _janitor: janitor })
    }

    /// Fetches `url` and returns the decoded body.
    pub fn get(&self, url: &str, options: &FetchOptions) -> Result<Bytes, FetchError> {
        Ok(self.adv_get(url, options)?.body)
    }

    /// Fetches `url` and returns the body together with the final URL,
    /// MIME type, charset label and the raw response.
    ///
    /// Final statuses of 400 and above become [`FetchError::Http`]; the
    /// response (the synthetic 409 of [`CachePolicy::CacheOnly`]
    /// included) rides along inside the error.
    pub fn adv_get(&self, url: &str, options: &FetchOptions) -> Result<FetchResult, FetchError> {
        let url = sanitize_url(url);
        debug!(url, "fetching");

        let mut req = Request::new(url);
        req.set_timeout(options.timeout);

        let mut resp = self.pipeline(options).fetch(req)?;
        if resp.status().as_u16() >= 400 {
            return Err(FetchError::http(resp));
        }

        let body = resp.read_body().map_err(transport::TransportError::from)?;
        let encoding = detect_encoding(&body, Some(resp.headers()));

        Ok(FetchResult {
            body,
            url: resp.url().to_string(),
            content_type: resp.mime_essence(),
            encoding,
            response: resp,
        })
    }

    fn pipeline(&self, options: &FetchOptions) -> Pipeline {
        let mut handlers: Vec<Box<dyn Handler>> = vec![
            Box::new(Gzip),
            Box::new(SizeLimit::default()),
            Box::new(UserAgent::random()),
            Box::new(BrowserlyHeaders),
            Box::new(EncodingFix::new(options.encoding.clone())),
            Box::new(HttpEquiv),
            Box::new(Refresh),
        ];
        if let Some(target) = options.follow {
            handlers.push(Box::new(AlternateLink::new(target)));
        }
        handlers.push(Box::new(HttpCache::new(Arc::clone(&self.store), options.policy, self.private_cache)));

        Pipeline::new(Arc::clone(&self.transport), handlers)
    }
}
