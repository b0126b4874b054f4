//! Normalisation of malformed text bodies.
//!
//! Text responses are decoded with the configured or detected charset
//! under the replacement policy and re-encoded to the same charset.
//! Valid text passes through unchanged; invalid byte sequences come out
//! as replacement characters instead of tripping up the parser later.

use bytes::Bytes;
use encoding_rs::Encoding;
use tracing::trace;

use crate::encoding::detect_encoding;
use crate::error::FetchError;
use crate::handler::Handler;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;

/// Re-encodes `text/*` bodies into well-formed byte sequences.
#[derive(Debug, Clone, Default)]
pub struct EncodingFix {
    /// Caller-supplied charset override; detected when absent
    override_label: Option<String>,
}

impl EncodingFix {
    pub fn new(override_label: Option<String>) -> Self {
        Self { override_label }
    }
}

impl Handler for EncodingFix {
    fn on_response(&self, _pipeline: &Pipeline, _req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        let is_text = resp.content_type().is_some_and(|mime| mime.type_() == mime::TEXT);
        if !resp.is_success() || !is_text {
            return Ok(resp);
        }

        let data = resp.read_body().map_err(crate::transport::TransportError::from)?;
        let label = match &self.override_label {
            Some(label) => label.clone(),
            None => detect_encoding(&data, Some(resp.headers())),
        };

        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            let (text, _, had_errors) = encoding.decode(&data);
            if had_errors {
                trace!(label, url = resp.url(), "repaired malformed text body");
            }
            let (fixed, _, _) = encoding.encode(&text);
            resp.set_body_bytes(Bytes::from(fixed.into_owned()));
        }

        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, StatusCode};
    use std::sync::Arc;

    fn text_response(body: &[u8], content_type: &'static str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, http::HeaderValue::from_static(content_type));
        Response::synthetic(StatusCode::OK, "OK", headers, "http://a/", Bytes::copy_from_slice(body))
    }

    fn run(fix: EncodingFix, resp: Response) -> Response {
        let pipeline = Pipeline::new(Arc::new(crate::testing::NoTransport), vec![]);
        fix.on_response(&pipeline, &Request::new("http://a/"), resp).unwrap()
    }

    #[test]
    fn valid_utf8_is_untouched() {
        let body = "héllo".as_bytes();
        let resp = run(EncodingFix::default(), text_response(body, "text/html; charset=utf-8"));
        assert_eq!(resp.body_bytes().unwrap().as_ref(), body);
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        // 0xff is not valid UTF-8
        let resp = run(EncodingFix::default(), text_response(b"ok \xff end", "text/plain; charset=utf-8"));
        let fixed = resp.body_bytes().unwrap();
        assert_eq!(std::str::from_utf8(fixed).unwrap(), "ok \u{fffd} end");
    }

    #[test]
    fn override_wins_over_detection() {
        // 0xe9 is é in latin-1; kept as latin-1, not transcoded
        let fix = EncodingFix::new(Some("iso-8859-1".to_string()));
        let resp = run(fix, text_response(b"caf\xe9", "text/plain"));
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"caf\xe9");
    }

    #[test]
    fn non_text_bodies_pass_through() {
        let body = b"\x1f\x8b binary";
        let resp = run(EncodingFix::default(), text_response(body, "application/octet-stream"));
        assert_eq!(resp.body_bytes().unwrap().as_ref(), body);
    }
}
