//! Small helpers shared by the unit tests.

use crate::request::Request;
use crate::transport::{RawResponse, Transport, TransportError};

/// A transport for pipelines that must never hit the network.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NoTransport;

impl Transport for NoTransport {
    fn perform(&self, req: &Request) -> Result<RawResponse, TransportError> {
        panic!("unexpected network request for {}", req.url());
    }
}
