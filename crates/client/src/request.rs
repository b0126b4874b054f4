//! The outgoing request as middlewares see it.
//!
//! Requests are always GET. Headers carry a visibility class: regular
//! headers travel on redirected requests too, *unredirected* headers are
//! sent only on the request they were added to. Identity-ish headers
//! (User-Agent, Accept-Encoding, cache validators, the internal control
//! header) are unredirected so a redirect target never sees validators
//! that belong to a different URL.

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};

/// A GET request flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct Request {
    url: String,
    headers: HeaderMap,
    unredirected: HeaderMap,
    timeout: Option<Duration>,
}

impl Request {
    /// Creates a bare GET request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), headers: HeaderMap::new(), unredirected: HeaderMap::new(), timeout: None }
    }

    /// The absolute request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Socket-level timeout for this request, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the socket-level timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Looks a header up, preferring the unredirected class.
    pub fn header(&self, name: &HeaderName) -> Option<&HeaderValue> {
        self.unredirected.get(name).or_else(|| self.headers.get(name))
    }

    /// Sets a header that survives redirects.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Sets a header that is dropped when the request is redirected.
    pub fn set_unredirected_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.unredirected.insert(name, value);
    }

    /// The redirect-surviving headers alone.
    pub fn redirectable_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Merged view for the transport: unredirected entries win on clash.
    pub fn all_headers(&self) -> HeaderMap {
        let mut merged = self.headers.clone();
        for (name, value) in &self.unredirected {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Derives the follow-up request for a redirect to `url`: regular
    /// headers and the timeout carry over, unredirected headers do not.
    pub fn redirect(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: self.headers.clone(),
            unredirected: HeaderMap::new(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{ACCEPT, USER_AGENT};

    #[test]
    fn unredirected_headers_shadow_and_vanish() {
        let mut req = Request::new("http://example.com/");
        req.set_header(ACCEPT, HeaderValue::from_static("text/html"));
        req.set_unredirected_header(USER_AGENT, HeaderValue::from_static("tester"));
        req.set_unredirected_header(ACCEPT, HeaderValue::from_static("*/*"));

        assert_eq!(req.header(&ACCEPT).unwrap(), "*/*");
        assert_eq!(req.all_headers().get(USER_AGENT).unwrap(), "tester");

        let next = req.redirect("http://example.com/next");
        assert_eq!(next.url(), "http://example.com/next");
        assert_eq!(next.header(&ACCEPT).unwrap(), "text/html");
        assert!(next.header(&USER_AGENT).is_none());
    }
}
