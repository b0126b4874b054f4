//! Transparent gzip decoding.
//!
//! Asks for gzip on the way out and unwraps it on the way back, before
//! the size cap and the cache see the body, so cached bodies are always
//! plain bytes. Servers routinely truncate compressed bodies mid-stream;
//! whatever inflated cleanly is kept and the rest is dropped.

use std::io::{self, Read};

use flate2::read::{MultiGzDecoder, ZlibDecoder};
use http::HeaderValue;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use tracing::warn;

use crate::error::FetchError;
use crate::handler::Handler;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::{Body, Response};

/// Requests and transparently decodes `Content-Encoding: gzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

impl Handler for Gzip {
    // below the size cap (450) and the cache (499): truncation applies to
    // inflated bytes and stored bodies carry identity encoding
    fn order(&self) -> u32 {
        400
    }

    fn on_request(&self, mut req: Request) -> Request {
        req.set_unredirected_header(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        req
    }

    fn on_response(&self, _pipeline: &Pipeline, _req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        let gzipped = resp
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|enc| enc.eq_ignore_ascii_case("gzip"));

        if resp.is_success() && gzipped {
            let reader = match resp.take_body() {
                Body::Stream(reader) => reader,
                Body::Buffer(bytes) => Box::new(io::Cursor::new(bytes)),
            };
            resp.set_body_stream(Box::new(TolerantReader::new(decoder_for(reader))));
            resp.headers_mut().insert(CONTENT_ENCODING, HeaderValue::from_static("identity"));
        }

        Ok(resp)
    }
}

/// Picks a decoder by framing: gzip magic, else raw zlib. Covers the
/// servers that send zlib streams under a gzip label.
fn decoder_for(reader: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
    let mut magic = [0u8; 2];
    let mut filled = 0;
    let mut reader = reader;
    while filled < magic.len() {
        match reader.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => break,
        }
    }

    let replayed = io::Cursor::new(magic[..filled].to_vec()).chain(reader);
    if magic == [0x1f, 0x8b] {
        Box::new(MultiGzDecoder::new(replayed))
    } else {
        Box::new(ZlibDecoder::new(replayed))
    }
}

/// Turns mid-stream decode errors into end-of-stream, keeping whatever
/// bytes came out before the failure.
struct TolerantReader<R> {
    inner: R,
    finished: bool,
}

impl<R: Read> TolerantReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, finished: false }
    }
}

impl<R: Read> Read for TolerantReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }
        match self.inner.read(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                warn!(error = %e, "truncated or corrupt compressed body, keeping decoded prefix");
                self.finished = true;
                Ok(0)
            }
        }
    }
}
