//! The response as it moves through the pipeline.
//!
//! Fresh off the transport a response body is a one-shot byte stream.
//! The first middleware that needs the bytes buffers them, and from then
//! on the body is an in-memory buffer that later middlewares (and the
//! caller) can re-read freely, the moral equivalent of rewrapping a
//! socket in a seekable reader.

use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use mime::Mime;

use crate::transport::RawResponse;

/// Body state: streaming until first buffered, in-memory afterwards.
pub enum Body {
    /// Unread stream handed over by the transport
    Stream(Box<dyn Read + Send>),
    /// Fully buffered bytes, re-readable at will
    Buffer(Bytes),
}

impl Body {
    /// An empty buffered body.
    pub fn empty() -> Self {
        Body::Buffer(Bytes::new())
    }

    fn into_reader(self) -> Box<dyn Read + Send> {
        match self {
            Body::Stream(reader) => reader,
            Body::Buffer(bytes) => Box::new(io::Cursor::new(bytes)),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
            Body::Buffer(bytes) => write!(f, "Body::Buffer({} bytes)", bytes.len()),
        }
    }
}

/// A response observed (and possibly rewritten) by middlewares.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    url: String,
    body: Body,
}

impl Response {
    /// Assembles a response from parts.
    pub fn new(status: StatusCode, reason: impl Into<String>, headers: HeaderMap, url: impl Into<String>, body: Body) -> Self {
        Self { status, reason: reason.into(), headers, url: url.into(), body }
    }

    /// Wraps what the transport returned.
    pub fn from_raw(raw: RawResponse) -> Self {
        Self::new(raw.status, raw.reason, raw.headers, raw.url, Body::Stream(raw.body))
    }

    /// A response manufactured without network I/O (cache hits, internal
    /// redirects, the forced-cache-miss conflict).
    pub fn synthetic(status: StatusCode, reason: impl Into<String>, headers: HeaderMap, url: impl Into<String>, body: Bytes) -> Self {
        Self::new(status, reason, headers, url, Body::Buffer(body))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Rewrites the status line, used by the synthetic-302 middlewares.
    pub fn set_status(&mut self, status: StatusCode, reason: impl Into<String>) {
        self.status = status;
        self.reason = reason.into();
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Final URL of the response (after any redirects so far).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The parsed Content-Type, if present and well-formed.
    pub fn content_type(&self) -> Option<Mime> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| ct.parse().ok())
    }

    /// MIME essence of the Content-Type (`type/subtype`, no parameters).
    pub fn mime_essence(&self) -> String {
        self.content_type().map(|m| m.essence_str().to_string()).unwrap_or_default()
    }

    /// Takes the body out, leaving an empty buffer behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::empty())
    }

    /// Replaces the body with a stream.
    pub fn set_body_stream(&mut self, reader: Box<dyn Read + Send>) {
        self.body = Body::Stream(reader);
    }

    /// Replaces the body with buffered bytes.
    pub fn set_body_bytes(&mut self, bytes: Bytes) {
        self.body = Body::Buffer(bytes);
    }

    /// The buffered bytes, if the body has been read already.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Buffer(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Returns the body bytes, draining and buffering the stream first if
    /// nobody has done so yet. Subsequent calls are cheap.
    pub fn read_body(&mut self) -> io::Result<Bytes> {
        if let Body::Buffer(bytes) = &self.body {
            return Ok(bytes.clone());
        }

        let mut data = Vec::new();
        self.take_body().into_reader().read_to_end(&mut data)?;
        let bytes = Bytes::from(data);
        self.body = Body::Buffer(bytes.clone());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_body_buffers_the_stream_once() {
        let stream: Box<dyn Read + Send> = Box::new(io::Cursor::new(b"<rss/>".to_vec()));
        let mut resp = Response::new(StatusCode::OK, "OK", HeaderMap::new(), "http://a/", Body::Stream(stream));

        assert!(resp.body_bytes().is_none());
        assert_eq!(resp.read_body().unwrap(), Bytes::from_static(b"<rss/>"));
        // second read comes from the buffer
        assert_eq!(resp.read_body().unwrap(), Bytes::from_static(b"<rss/>"));
        assert_eq!(resp.body_bytes().unwrap(), &Bytes::from_static(b"<rss/>"));
    }

    #[test]
    fn mime_essence_strips_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, "text/html; charset=utf-8".parse().unwrap());
        let resp = Response::new(StatusCode::OK, "OK", headers, "http://a/", Body::empty());
        assert_eq!(resp.mime_essence(), "text/html");
    }
}
