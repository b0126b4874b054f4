//! `<meta http-equiv>` support.
//!
//! Pages use meta http-equiv elements to define HTTP headers from inside
//! the document; folding them into the real header map lets the rest of
//! the pipeline (notably the refresh middleware) treat them uniformly.

use http::{HeaderName, HeaderValue};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::trace;

use crate::error::FetchError;
use crate::handler::{Handler, is_htmlish};
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;

// meta elements beyond this prefix don't set headers worth honouring
const PARSE_WINDOW: usize = 10_000;

static META_HTTP_EQUIV: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[http-equiv]").expect("valid meta selector"));

/// Hoists `meta[http-equiv]` declarations into response headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpEquiv;

impl Handler for HttpEquiv {
    fn order(&self) -> u32 {
        600
    }

    fn on_response(&self, _pipeline: &Pipeline, _req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        if !resp.is_success() || !is_htmlish(&resp.mime_essence()) {
            return Ok(resp);
        }

        let data = resp.read_body().map_err(crate::transport::TransportError::from)?;
        let head = String::from_utf8_lossy(&data[..data.len().min(PARSE_WINDOW)]).into_owned();

        // the parser is tolerant by construction; anything it cannot make
        // sense of simply yields no matching elements
        let document = Html::parse_document(&head);
        for element in document.select(&META_HTTP_EQUIV) {
            let (Some(name), Some(content)) = (element.attr("http-equiv"), element.attr("content")) else {
                continue;
            };
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.to_lowercase().as_bytes()),
                HeaderValue::from_str(content),
            ) else {
                continue;
            };
            trace!(header = %name, "hoisted meta http-equiv");
            resp.headers_mut().insert(name, value);
        }

        Ok(resp)
    }
}
