//! Caps how much of a body is kept.

use std::io::Read;

use bytes::Bytes;
use tracing::debug;

use crate::error::FetchError;
use crate::handler::Handler;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::{Body, Response};

/// Default body cap: 500 KiB.
pub const DEFAULT_LIMIT: usize = 500 * 1024;

/// Reads at most `limit` bytes of the body and discards the rest.
///
/// This is also the point where every body becomes an in-memory buffer:
/// whatever reaches the handlers after this one is re-readable.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimit {
    limit: usize,
}

impl SizeLimit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl Handler for SizeLimit {
    fn order(&self) -> u32 {
        450
    }

    fn on_response(&self, _pipeline: &Pipeline, _req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        let truncated = match resp.take_body() {
            Body::Buffer(bytes) => {
                let len = bytes.len().min(self.limit);
                bytes.slice(..len)
            }
            Body::Stream(reader) => {
                let mut data = Vec::new();
                reader
                    .take(self.limit as u64)
                    .read_to_end(&mut data)
                    .map_err(crate::transport::TransportError::from)?;
                Bytes::from(data)
            }
        };
        if truncated.len() == self.limit {
            debug!(limit = self.limit, url = resp.url(), "body reached the size cap");
        }
        resp.set_body_bytes(truncated);
        Ok(resp)
    }
}
