//! Best-effort normalisation of user-supplied URLs.
//!
//! Feed URLs arrive from config files, CLI arguments and scraped pages,
//! so almost anything can show up here: missing schemes, the `http:/host`
//! typo, literal spaces, non-ASCII hostnames and paths. Sanitisation is
//! total (malformed input yields a best-effort string, never an error)
//! and idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;
use url::Url;

const PROTOCOLS: [&str; 2] = ["http", "https"];

// fix http:/host and https:/host, anchored so a valid URL is untouched
static SCHEME_TYPO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?):/([^/])").expect("valid scheme-typo pattern"));

/// Normalises `url` into an absolute ASCII http(s) URL.
///
/// Rules, in order: prepend `http://` when the scheme is missing or
/// unknown; repair the `http:/host` typo; escape literal spaces; then
/// parse and re-serialise, which IDNA-encodes non-ASCII host labels and
/// percent-encodes non-ASCII path, query and fragment bytes as UTF-8.
pub fn sanitize_url(url: &str) -> String {
    let mut url = url.to_string();

    if !PROTOCOLS.contains(&url.split(':').next().unwrap_or_default()) {
        url = format!("http://{url}");
    }

    url = SCHEME_TYPO.replace(&url, "$1://$2").into_owned();
    let url = url.replace(' ', "%20");

    match Url::parse(&url) {
        Ok(parsed) => parsed.to_string(),
        Err(e) => {
            trace!(url, error = %e, "keeping unparseable url as-is");
            url
        }
    }
}
