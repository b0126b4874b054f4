//! The middleware chain: request/response interceptors around one fetch.
//!
//! Each handler carries an integer order key deciding its position in
//! the chain (lower runs earlier; the default is [`DEFAULT_ORDER`]) and
//! implements whichever hooks it needs. Hooks default to pass-through,
//! so a handler states only what it touches.

use crate::error::FetchError;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;

pub mod alternate;
pub mod browserly;
pub mod cache;
pub mod encoding_fix;
pub mod gzip;
pub mod http_equiv;
pub mod refresh;
pub mod size_limit;
pub mod ua;

pub use alternate::{AlternateLink, FollowTarget};
pub use browserly::BrowserlyHeaders;
pub use cache::{CachePolicy, HttpCache};
pub use encoding_fix::EncodingFix;
pub use gzip::Gzip;
pub use http_equiv::HttpEquiv;
pub use refresh::Refresh;
pub use size_limit::SizeLimit;
pub use ua::UserAgent;

/// Order assigned to handlers that do not care where they run.
pub const DEFAULT_ORDER: u32 = 500;

/// MIME essences treated as HTML-ish documents worth parsing.
pub(crate) const HTML_MIMES: [&str; 3] = ["text/html", "application/xhtml+xml", "application/xml"];

/// True when `essence` (a `type/subtype` string) is HTML-ish.
pub(crate) fn is_htmlish(essence: &str) -> bool {
    HTML_MIMES.iter().any(|m| m.eq_ignore_ascii_case(essence))
}

/// A request/response interceptor in the pipeline.
///
/// `on_request` may rewrite the outgoing request; `on_open` may
/// short-circuit the network by synthesising a response; `on_status`
/// handles specific status codes before the generic response phase and
/// may substitute an entirely different response (it receives the
/// pipeline so it can re-enter it); `on_response` observes or replaces
/// the response, and may buffer the body. Buffered bodies stay
/// re-readable for the handlers that follow.
pub trait Handler: Send + Sync {
    /// Sort key for pipeline position.
    fn order(&self) -> u32 {
        DEFAULT_ORDER
    }

    /// Rewrites the outgoing request.
    fn on_request(&self, req: Request) -> Request {
        req
    }

    /// Offers a response without touching the network; `None` delegates
    /// to the next handler (and ultimately the transport).
    fn on_open(&self, _req: &Request) -> Result<Option<Response>, FetchError> {
        Ok(None)
    }

    /// Reacts to a specific status code with a replacement response.
    fn on_status(
        &self,
        _pipeline: &Pipeline,
        _req: &Request,
        _resp: &Response,
    ) -> Result<Option<Response>, FetchError> {
        Ok(None)
    }

    /// Observes or replaces the response.
    fn on_response(
        &self,
        _pipeline: &Pipeline,
        _req: &Request,
        resp: Response,
    ) -> Result<Response, FetchError> {
        Ok(resp)
    }
}
