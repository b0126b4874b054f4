//! Extra request headers to look less suspicious to bot filters.

use http::HeaderValue;
use http::header::{ACCEPT, ACCEPT_LANGUAGE};

use crate::handler::Handler;
use crate::request::Request;

/// Sets the `Accept`/`Accept-Language` pair a desktop browser would send.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserlyHeaders;

impl Handler for BrowserlyHeaders {
    fn on_request(&self, mut req: Request) -> Request {
        req.set_header(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        req.set_header(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        req
    }
}
