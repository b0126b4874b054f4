//! The driver that walks one request through the middleware chain.
//!
//! Handlers are held sorted by their order key (stable, so ties keep
//! insertion order) and each request flows through four phases: request
//! hooks, open hooks (first synthesised response short-circuits the
//! network), status-specific hooks, then response hooks. A redirect at
//! the end re-enters the whole pipeline with a derived request.

use http::header::LOCATION;
use http::{HeaderName, HeaderValue, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::error::FetchError;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;
use std::sync::Arc;

/// Private header carrying control signals between middlewares.
///
/// It never leaves the pipeline: inbound copies are dropped as spoofed,
/// and [`Pipeline::fetch`] strips it from the response it returns.
pub const CONTROL_HEADER: HeaderName = HeaderName::from_static("feedgrab");

/// Control value marking a response served out of the cache.
pub const FROM_CACHE: HeaderValue = HeaderValue::from_static("from_cache");

/// Control value marking the replayed request after a 304 revalidation.
pub const FROM_304: HeaderValue = HeaderValue::from_static("from_304");

/// Redirect hops allowed before giving up.
pub const MAX_REDIRECTS: usize = 10;

const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// An ordered middleware chain bound to a transport.
pub struct Pipeline {
    handlers: Vec<Box<dyn Handler>>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("handlers", &self.handlers.len()).finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Builds a pipeline, sorting handlers by their order key.
    pub fn new(transport: Arc<dyn Transport>, mut handlers: Vec<Box<dyn Handler>>) -> Self {
        handlers.sort_by_key(|h| h.order());
        Self { handlers, transport }
    }

    /// Drives `req` to a final response and scrubs internal headers.
    pub fn fetch(&self, req: Request) -> Result<Response, FetchError> {
        let mut resp = self.open(req, MAX_REDIRECTS)?;
        resp.headers_mut().remove(CONTROL_HEADER);
        Ok(resp)
    }

    /// One full pass through the phases; recursion handles redirects and
    /// the cache's 304 replay.
    pub(crate) fn open(&self, req: Request, redirects_left: usize) -> Result<Response, FetchError> {
        let mut req = req;
        for handler in &self.handlers {
            req = handler.on_request(req);
        }

        let mut opened = None;
        for handler in &self.handlers {
            if let Some(resp) = handler.on_open(&req)? {
                trace!(url = req.url(), "open hook synthesised a response");
                opened = Some(resp);
                break;
            }
        }

        let mut resp = match opened {
            Some(resp) => resp,
            None => {
                let mut resp = Response::from_raw(self.transport.perform(&req)?);
                // inbound copies of the control header are spoofed
                resp.headers_mut().remove(CONTROL_HEADER);
                resp
            }
        };

        // status-specific hooks (the 304 replay) run before the generic
        // response phase; a replacement already went through a full pass
        for handler in &self.handlers {
            if let Some(replacement) = handler.on_status(self, &req, &resp)? {
                return Ok(replacement);
            }
        }

        for handler in &self.handlers {
            resp = handler.on_response(self, &req, resp)?;
        }

        if REDIRECT_STATUSES.contains(&resp.status().as_u16()) {
            if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                if redirects_left == 0 {
                    return Err(FetchError::TooManyRedirects {
                        limit: MAX_REDIRECTS,
                        url: req.url().to_string(),
                    });
                }
                let target = resolve_location(resp.url(), location);
                debug!(from = resp.url(), to = %target, status = resp.status().as_u16(), "following redirect");
                return self.open(req.redirect(target), redirects_left - 1);
            }
        }

        Ok(resp)
    }
}

/// Resolves a possibly-relative `Location` against the response URL.
fn resolve_location(base: &str, location: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(location.trim())) {
        Ok(url) => url.to_string(),
        Err(_) => location.trim().to_string(),
    }
}

/// Synthesises an internal `302 Moved Temporarily` pointing at `location`,
/// reusing the headers and URL of the response it replaces.
pub(crate) fn synthetic_redirect(resp: &mut Response, location: &str) {
    resp.set_status(StatusCode::FOUND, "Moved Temporarily");
    if let Ok(value) = HeaderValue::from_str(location) {
        resp.headers_mut().insert(LOCATION, value);
    }
}
