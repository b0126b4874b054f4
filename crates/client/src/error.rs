//! Error types at the fetch API boundary.
//!
//! Two families matter to callers: transport failures (the network said
//! no) and HTTP failures (the network answered with a status of 400 or
//! above, including the synthetic 409 produced when the cache-only
//! policy finds nothing). Content-layer defects never surface as
//! errors; the pipeline repairs or ignores them.

use http::StatusCode;
use thiserror::Error;

use crate::response::Response;
use crate::transport::TransportError;
use feedgrab_cache::CacheError;

/// The top-level error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    /// The final response carried an error status; the response itself
    /// (headers and body included) rides along for inspection
    #[error("http error {status} for {url}")]
    Http {
        status: StatusCode,
        url: String,
        response: Box<Response>,
    },

    /// Redirect chain exceeded the hop limit
    #[error("stopped after {limit} redirects at {url}")]
    TooManyRedirects { limit: usize, url: String },

    /// A cache storage backend could not be constructed
    #[error("cache error: {source}")]
    Cache {
        #[from]
        source: CacheError,
    },
}

impl FetchError {
    /// Wraps a finished response whose status signals failure.
    pub fn http(response: Response) -> Self {
        Self::Http {
            status: response.status(),
            url: response.url().to_string(),
            response: Box::new(response),
        }
    }

    /// Status code for HTTP errors, `None` otherwise.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
