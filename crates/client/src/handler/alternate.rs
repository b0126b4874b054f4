//! `<link rel="alternate">` following.
//!
//! When the caller wanted a feed but the server answered with an HTML
//! landing page, the page itself usually advertises the feed through a
//! `link[rel=alternate]` element. Rewriting the response into a
//! synthetic 302 at that href gets the caller the document it asked for.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::FetchError;
use crate::handler::{Handler, is_htmlish};
use crate::pipeline::{Pipeline, synthetic_redirect};
use crate::request::Request;
use crate::response::Response;

const PARSE_WINDOW: usize = 10_000;

static ALTERNATE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel="alternate"]"#).expect("valid link selector"));

/// Document families the caller may ask to be steered towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowTarget {
    /// Any XML document, feeds included
    Xml,
    /// Feed formats only
    Rss,
    /// HTML documents
    Html,
}

impl FollowTarget {
    /// MIME essences belonging to this family.
    pub fn mime_types(self) -> &'static [&'static str] {
        match self {
            FollowTarget::Xml => &[
                "text/xml",
                "application/xml",
                "application/rss+xml",
                "application/rdf+xml",
                "application/atom+xml",
                "application/xhtml+xml",
            ],
            FollowTarget::Rss => &["application/rss+xml", "application/rdf+xml", "application/atom+xml"],
            FollowTarget::Html => &["text/html", "application/xhtml+xml", "application/xml"],
        }
    }
}

/// Steers HTML landing pages towards an advertised alternate document.
#[derive(Debug, Clone)]
pub struct AlternateLink {
    follow: &'static [&'static str],
}

impl AlternateLink {
    pub fn new(target: FollowTarget) -> Self {
        Self { follow: target.mime_types() }
    }

    fn wants(&self, essence: &str) -> bool {
        self.follow.iter().any(|m| m.eq_ignore_ascii_case(essence))
    }
}

impl Handler for AlternateLink {
    fn on_response(&self, _pipeline: &Pipeline, _req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        let essence = resp.mime_essence();
        if !resp.is_success() || !is_htmlish(&essence) || self.wants(&essence) {
            return Ok(resp);
        }

        // not what we were looking for; maybe the page advertises an
        // alternative of the right type
        let data = resp.read_body().map_err(crate::transport::TransportError::from)?;
        let head = String::from_utf8_lossy(&data[..data.len().min(PARSE_WINDOW)]).into_owned();

        let document = Html::parse_document(&head);
        let target = document.select(&ALTERNATE_LINKS).find_map(|link| {
            let kind = link.attr("type").unwrap_or_default();
            self.wants(kind).then(|| link.attr("href")).flatten().map(str::to_string)
        });

        if let Some(href) = target {
            debug!(url = resp.url(), href, "following alternate link");
            synthetic_redirect(&mut resp, &href);
        }

        Ok(resp)
    }
}
