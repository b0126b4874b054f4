//! The network seam: "perform one HTTP GET, hand back status, headers
//! and a streaming body".
//!
//! Everything above this trait is policy (redirects, caching and
//! decompression all live in the pipeline), so the transport is told to
//! do none of it. Tests drive the full pipeline through a scripted
//! implementation of the same trait.

use std::io::{self, Read};

use http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::request::Request;

/// What the wire gave us for a single request, body unread.
pub struct RawResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Reason phrase from the status line
    pub reason: String,
    /// Response headers
    pub headers: HeaderMap,
    /// URL the response was served from
    pub url: String,
    /// Unread body stream
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Transport-level failure: DNS, connect, TLS, timeout.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client failed to complete the exchange
    #[error("request failed: {source}")]
    Client {
        #[from]
        source: reqwest::Error,
    },

    /// I/O failure while talking to the peer
    #[error("i/o error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Performs one HTTP GET without following redirects or decoding bodies.
pub trait Transport: Send + Sync {
    fn perform(&self, req: &Request) -> Result<RawResponse, TransportError>;
}

/// Production transport over a blocking HTTP client.
///
/// Redirects are disabled (the pipeline follows them itself so its
/// middlewares see every hop), transparent decompression is not compiled
/// in (the gzip middleware owns it), and cookies are kept in an
/// in-process jar for the lifetime of the transport.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Builds the client. `ignore_tls` disables certificate verification
    /// for the whole transport.
    pub fn new(ignore_tls: bool) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_store(true)
            .danger_accept_invalid_certs(ignore_tls)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn perform(&self, req: &Request) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.get(req.url());
        for (name, value) in &req.all_headers() {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = req.timeout() {
            builder = builder.timeout(timeout);
        }

        let response = builder.send()?;
        let status = response.status();
        debug!(url = req.url(), status = status.as_u16(), "performed request");

        Ok(RawResponse {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers: response.headers().clone(),
            url: response.url().to_string(),
            body: Box::new(response),
        })
    }
}
