//! `Refresh` header support.
//!
//! A `Refresh: <delay>;url=<target>` header (usually hoisted out of a
//! meta http-equiv element) is an informal redirect; rewriting it into a
//! synthetic 302 lets the driver follow it like any other.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::FetchError;
use crate::handler::Handler;
use crate::pipeline::{Pipeline, synthetic_redirect};
use crate::request::Request;
use crate::response::Response;

// delay, then a url that may be single-quoted, double-quoted or bare
static REFRESH_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^([0-9]+)\s*;\s*url=(?:"([^"]*)"|'([^']*)'|(.*))$"#).expect("valid refresh pattern")
});

/// Converts a `Refresh` header on a 2xx response into a synthetic 302.
#[derive(Debug, Clone, Copy, Default)]
pub struct Refresh;

/// Extracts the target URL from a refresh value like `3;url="/feed"`.
fn parse_refresh(value: &str) -> Option<&str> {
    let captures = REFRESH_VALUE.captures(value)?;
    let url = captures.get(2).or_else(|| captures.get(3)).or_else(|| captures.get(4))?.as_str();
    (!url.is_empty()).then_some(url)
}

impl Handler for Refresh {
    fn order(&self) -> u32 {
        700
    }

    fn on_response(&self, _pipeline: &Pipeline, _req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        if !resp.is_success() {
            return Ok(resp);
        }

        let target = resp
            .headers()
            .get("refresh")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_refresh)
            .map(str::to_string);

        if let Some(target) = target {
            debug!(url = resp.url(), target, "rewriting refresh header into a redirect");
            synthetic_redirect(&mut resp, &target);
        }

        Ok(resp)
    }
}
