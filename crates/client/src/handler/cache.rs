//! Conditional HTTP caching on ETag / Last-Modified.
//!
//! Sits between the body-shaping handlers below it (gzip, size cap) and
//! the content handlers above it, so stored bodies are always plain,
//! capped bytes and a response served out of the cache still flows
//! through the meta-redirect handlers like a fresh one.
//!
//! Revalidation uses a replay trick: on a `304 Not Modified` the stored
//! record's timestamp is bumped and the request is re-issued through the
//! whole pipeline carrying an internal marker; the open hook honours the
//! marker by serving the stored body, so the caller sees exactly what a
//! normal cache hit would have produced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, StatusCode};
use tracing::{debug, trace};

use crate::error::FetchError;
use crate::handler::Handler;
use crate::pipeline::{CONTROL_HEADER, FROM_304, FROM_CACHE, MAX_REDIRECTS, Pipeline};
use crate::request::Request;
use crate::response::Response;
use feedgrab_cache::{CacheRecord, CacheStore, epoch_now};

// permanent redirects stay canonical for a week before revalidation
const PERMANENT_REDIRECT_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// How aggressively the cache overrides server-declared validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Honour server `Cache-Control`/`Pragma` headers
    #[default]
    Validate,
    /// Any present record wins, regardless of age; fetch on miss
    PreferCache,
    /// Any present record wins; a miss becomes a synthetic 409 Conflict
    CacheOnly,
    /// Ignore any record, always refetch
    Refresh,
    /// A record younger than this many seconds wins, else refetch
    MaxAge(u64),
}

/// The cache middleware.
pub struct HttpCache {
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
    /// Whether this cache serves a single end user. A shared (CDN-like)
    /// cache must not retain `Cache-Control: private` pages; a private
    /// one may.
    private_cache: bool,
}

impl std::fmt::Debug for HttpCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCache")
            .field("policy", &self.policy)
            .field("private_cache", &self.private_cache)
            .finish_non_exhaustive()
    }
}

impl HttpCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy, private_cache: bool) -> Self {
        Self { store, policy, private_cache }
    }

    fn synthesise_hit(&self, req: &Request, record: &CacheRecord) -> Response {
        let mut headers = record.header_map();
        headers.insert(CONTROL_HEADER, FROM_CACHE);
        Response::synthetic(
            StatusCode::from_u16(record.status).unwrap_or(StatusCode::OK),
            record.reason.clone(),
            headers,
            req.url(),
            Bytes::from(record.body.clone()),
        )
    }

    fn synthesise_conflict(&self, req: &Request) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTROL_HEADER, FROM_CACHE);
        Response::synthetic(StatusCode::CONFLICT, "Conflict", headers, req.url(), Bytes::new())
    }

    /// Whether the stored directives forbid serving from this cache.
    fn forbidden_by(&self, directives: &Directives) -> bool {
        directives.flag("no-cache")
            || directives.flag("no-store")
            || (directives.flag("private") && !self.private_cache)
    }
}

impl Handler for HttpCache {
    fn order(&self) -> u32 {
        499
    }

    /// Arms conditional-request validators from the stored record.
    fn on_request(&self, mut req: Request) -> Request {
        let Some(record) = self.store.get(req.url()) else {
            return req;
        };
        let headers = record.header_map();
        if let Some(etag) = headers.get(http::header::ETAG) {
            req.set_unredirected_header(IF_NONE_MATCH, etag.clone());
        }
        if let Some(modified) = headers.get(http::header::LAST_MODIFIED) {
            req.set_unredirected_header(IF_MODIFIED_SINCE, modified.clone());
        }
        req
    }

    /// Decides between serving the record and letting the fetch happen.
    fn on_open(&self, req: &Request) -> Result<Option<Response>, FetchError> {
        let record = self.store.get(req.url());

        // replay of a 304 revalidation: the record was just refreshed
        if req.header(&CONTROL_HEADER) == Some(&FROM_304) {
            if let Some(record) = &record {
                trace!(url = req.url(), "serving revalidated record");
                return Ok(Some(self.synthesise_hit(req, record)));
            }
        }

        if self.policy == CachePolicy::CacheOnly {
            return match &record {
                Some(record) => Ok(Some(self.synthesise_hit(req, record))),
                None => {
                    debug!(url = req.url(), "cache-only fetch missed");
                    Ok(Some(self.synthesise_conflict(req)))
                }
            };
        }

        let Some(record) = record else {
            return Ok(None);
        };

        let directives = Directives::parse(&record.header_map());
        let age = record.age(epoch_now());

        let hit = match self.policy {
            CachePolicy::PreferCache => true,
            CachePolicy::Refresh => false,
            _ if record.status == 301 && age < PERMANENT_REDIRECT_TTL.as_secs() => true,
            CachePolicy::Validate if self.forbidden_by(&directives) => false,
            _ if directives.value("max-age").is_some_and(|max| age < max) => true,
            CachePolicy::MaxAge(limit) if age < limit => true,
            // nothing vouches for the record, refresh it
            _ => false,
        };

        if hit {
            debug!(url = req.url(), age, "serving cached record");
            Ok(Some(self.synthesise_hit(req, &record)))
        } else {
            Ok(None)
        }
    }

    /// The 304 replay described in the module docs.
    fn on_status(&self, pipeline: &Pipeline, req: &Request, resp: &Response) -> Result<Option<Response>, FetchError> {
        if resp.status() != StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        let Some(mut record) = self.store.get(req.url()) else {
            return Ok(None);
        };

        debug!(url = req.url(), "not modified, refreshing record and replaying");
        record.timestamp = epoch_now();
        self.store.set(req.url(), record);

        let mut replay = Request::new(req.url());
        for (name, value) in req.redirectable_headers() {
            replay.set_header(name.clone(), value.clone());
        }
        replay.set_timeout(req.timeout());
        replay.set_unredirected_header(CONTROL_HEADER, FROM_304);

        pipeline.open(replay, MAX_REDIRECTS).map(Some)
    }

    /// Persists cacheable responses after the body has been shaped.
    fn on_response(&self, _pipeline: &Pipeline, req: &Request, mut resp: Response) -> Result<Response, FetchError> {
        if resp.status() == StatusCode::NOT_MODIFIED {
            // the status hook already dealt with it
            return Ok(resp);
        }

        if self.policy == CachePolicy::Validate {
            let directives = Directives::parse(resp.headers());
            if self.forbidden_by(&directives) {
                trace!(url = req.url(), "response forbids caching");
                return Ok(resp);
            }
        }

        if resp.headers().get(CONTROL_HEADER) == Some(&FROM_CACHE) {
            // came out of the cache, nothing new to save
            return Ok(resp);
        }

        let body = resp.read_body().map_err(crate::transport::TransportError::from)?;
        let mut headers = resp.headers().clone();
        headers.remove(CONTROL_HEADER);
        let record = CacheRecord::new(resp.status().as_u16(), resp.reason(), &headers, body.to_vec(), epoch_now());
        self.store.set(req.url(), record);

        Ok(resp)
    }
}

/// The token-list and `key=value` views over `Cache-Control` and
/// `Pragma` headers.
#[derive(Debug, Default)]
struct Directives {
    flags: Vec<String>,
    values: HashMap<String, String>,
}

impl Directives {
    fn parse(headers: &HeaderMap) -> Self {
        let mut directives = Directives::default();
        for name in [http::header::CACHE_CONTROL, http::header::PRAGMA] {
            for value in headers.get_all(name) {
                let Ok(value) = value.to_str() else { continue };
                for token in split_http_list(value) {
                    match token.split_once('=') {
                        Some((key, value)) => {
                            let value = value.trim().trim_matches('"').to_string();
                            directives.values.insert(key.trim().to_lowercase(), value);
                        }
                        None => directives.flags.push(token.to_lowercase()),
                    }
                }
            }
        }
        directives
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }

    /// Numeric directive value, `None` when absent or malformed.
    fn value(&self, name: &str) -> Option<u64> {
        self.values.get(name).and_then(|v| v.parse().ok())
    }
}

/// Splits a comma-separated HTTP list, leaving quoted strings intact.
fn split_http_list(value: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if quoted && c == '\\' {
            escaped = true;
        } else if c == '"' {
            quoted = !quoted;
            current.push(c);
        } else if c == ',' && !quoted {
            if !current.trim().is_empty() {
                tokens.push(current.trim().to_string());
            }
            current.clear();
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::NoTransport;
    use feedgrab_cache::MemoryStore;
    use http::HeaderValue;

    fn store_with(url: &str, record: CacheRecord) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(100));
        store.set(url, record);
        store
    }

    fn record(status: u16, headers: &[(&'static str, &'static str)], body: &[u8], timestamp: u64) -> CacheRecord {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(value));
        }
        CacheRecord::new(status, "OK", &map, body.to_vec(), timestamp)
    }

    fn handler(store: Arc<MemoryStore>, policy: CachePolicy) -> HttpCache {
        HttpCache::new(store, policy, false)
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(NoTransport), vec![])
    }

    const URL: &str = "http://example.com/feed.xml";

    #[test]
    fn request_hook_arms_validators() {
        let store = store_with(
            URL,
            record(200, &[("etag", "\"abc\""), ("last-modified", "Mon, 01 Jan 2024 00:00:00 GMT")], b"<rss/>", epoch_now()),
        );
        let req = handler(store, CachePolicy::Validate).on_request(Request::new(URL));

        assert_eq!(req.header(&IF_NONE_MATCH).unwrap(), "\"abc\"");
        assert_eq!(req.header(&IF_MODIFIED_SINCE).unwrap(), "Mon, 01 Jan 2024 00:00:00 GMT");
        // validators are for this URL only, redirects must not carry them
        assert!(req.redirect("http://other/").header(&IF_NONE_MATCH).is_none());
    }

    #[test]
    fn empty_cache_delegates_to_the_network() {
        let cache = handler(Arc::new(MemoryStore::new(10)), CachePolicy::Validate);
        assert!(cache.on_open(&Request::new(URL)).unwrap().is_none());
    }

    #[test]
    fn prefer_cache_ignores_age_and_directives() {
        let store = store_with(URL, record(200, &[("cache-control", "no-store")], b"old", 0));
        let cache = handler(store, CachePolicy::PreferCache);

        let resp = cache.on_open(&Request::new(URL)).unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"old");
        assert_eq!(resp.headers().get(CONTROL_HEADER).unwrap(), "from_cache");
    }

    #[test]
    fn cache_only_miss_synthesises_a_conflict() {
        let cache = handler(Arc::new(MemoryStore::new(10)), CachePolicy::CacheOnly);
        let resp = cache.on_open(&Request::new(URL)).unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(resp.headers().get(CONTROL_HEADER).unwrap(), "from_cache");
    }

    #[test]
    fn cache_only_hit_serves_the_record() {
        let store = store_with(URL, record(200, &[], b"kept", 0));
        let cache = handler(store, CachePolicy::CacheOnly);
        let resp = cache.on_open(&Request::new(URL)).unwrap().unwrap();
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"kept");
    }

    #[test]
    fn refresh_always_refetches() {
        let store = store_with(URL, record(200, &[("cache-control", "max-age=9999999")], b"x", epoch_now()));
        let cache = handler(store, CachePolicy::Refresh);
        assert!(cache.on_open(&Request::new(URL)).unwrap().is_none());
    }

    #[test]
    fn permanent_redirects_stay_sticky_for_a_week() {
        let now = epoch_now();
        let store = store_with(URL, record(301, &[("location", "http://example.com/moved")], b"", now - 3600));
        let cache = handler(store.clone(), CachePolicy::Validate);
        let resp = cache.on_open(&Request::new(URL)).unwrap().unwrap();
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);

        // a week later the 301 is revalidated like anything else
        store.set(URL, record(301, &[("location", "http://example.com/moved")], b"", now - 8 * 24 * 3600));
        assert!(cache.on_open(&Request::new(URL)).unwrap().is_none());
    }

    #[test]
    fn validate_honours_stored_no_store() {
        let store = store_with(URL, record(200, &[("cache-control", "no-store, must-revalidate")], b"x", epoch_now()));
        let cache = handler(store, CachePolicy::Validate);
        assert!(cache.on_open(&Request::new(URL)).unwrap().is_none());
    }

    #[test]
    fn private_records_are_skipped_by_shared_caches_only() {
        let now = epoch_now();
        let store = store_with(URL, record(200, &[("cache-control", "private, max-age=600")], b"p", now));

        let shared = HttpCache::new(store.clone(), CachePolicy::Validate, false);
        assert!(shared.on_open(&Request::new(URL)).unwrap().is_none());

        let private = HttpCache::new(store, CachePolicy::Validate, true);
        assert!(private.on_open(&Request::new(URL)).unwrap().is_some());
    }

    #[test]
    fn max_age_directive_vouches_for_the_record() {
        let now = epoch_now();
        let store = store_with(URL, record(200, &[("cache-control", "max-age=600")], b"fresh", now - 60));
        let cache = handler(store.clone(), CachePolicy::Validate);
        assert!(cache.on_open(&Request::new(URL)).unwrap().is_some());

        store.set(URL, record(200, &[("cache-control", "max-age=30")], b"stale", now - 60));
        assert!(cache.on_open(&Request::new(URL)).unwrap().is_none());
    }

    #[test]
    fn max_age_policy_uses_the_configured_window() {
        let now = epoch_now();
        let store = store_with(URL, record(200, &[], b"x", now - 60));

        let fresh = handler(store.clone(), CachePolicy::MaxAge(120));
        assert!(fresh.on_open(&Request::new(URL)).unwrap().is_some());

        let strict = handler(store, CachePolicy::MaxAge(30));
        assert!(strict.on_open(&Request::new(URL)).unwrap().is_none());
    }

    #[test]
    fn response_hook_stores_and_rereads() {
        let store = Arc::new(MemoryStore::new(10));
        let cache = handler(store.clone(), CachePolicy::Validate);
        let resp = Response::synthetic(StatusCode::OK, "OK", HeaderMap::new(), URL, Bytes::from_static(b"<rss/>"));

        let resp = cache.on_response(&pipeline(), &Request::new(URL), resp).unwrap();
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"<rss/>");

        let stored = store.get(URL).unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.body, b"<rss/>");
    }

    #[test]
    fn no_store_responses_are_not_written_under_validate() {
        let store = Arc::new(MemoryStore::new(10));
        let cache = handler(store.clone(), CachePolicy::Validate);
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static("no-store"));
        let resp = Response::synthetic(StatusCode::OK, "OK", headers, URL, Bytes::from_static(b"x"));

        cache.on_response(&pipeline(), &Request::new(URL), resp).unwrap();
        assert!(store.get(URL).is_none());
    }

    #[test]
    fn no_store_responses_are_written_under_overrides() {
        let store = Arc::new(MemoryStore::new(10));
        let cache = handler(store.clone(), CachePolicy::PreferCache);
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static("no-store"));
        let resp = Response::synthetic(StatusCode::OK, "OK", headers, URL, Bytes::from_static(b"x"));

        cache.on_response(&pipeline(), &Request::new(URL), resp).unwrap();
        assert!(store.get(URL).is_some());
    }

    #[test]
    fn cache_hits_are_not_stored_again() {
        let store = Arc::new(MemoryStore::new(10));
        let cache = handler(store.clone(), CachePolicy::Validate);
        let mut headers = HeaderMap::new();
        headers.insert(CONTROL_HEADER, FROM_CACHE);
        let resp = Response::synthetic(StatusCode::OK, "OK", headers, URL, Bytes::from_static(b"x"));

        cache.on_response(&pipeline(), &Request::new(URL), resp).unwrap();
        assert!(store.get(URL).is_none());
    }

    #[test]
    fn control_header_never_reaches_the_store() {
        let store = Arc::new(MemoryStore::new(10));
        let cache = handler(store.clone(), CachePolicy::PreferCache);
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"x\""));
        let resp = Response::synthetic(StatusCode::OK, "OK", headers, URL, Bytes::from_static(b"x"));
        cache.on_response(&pipeline(), &Request::new(URL), resp).unwrap();

        let stored = store.get(URL).unwrap();
        assert!(!stored.headers.contains("feedgrab"));
        assert!(stored.header_map().get("etag").is_some());
    }

    #[test]
    fn replay_marker_serves_the_record_from_open() {
        let store = store_with(URL, record(200, &[("cache-control", "no-store")], b"replayed", 0));
        let cache = handler(store, CachePolicy::Validate);

        let mut req = Request::new(URL);
        req.set_unredirected_header(CONTROL_HEADER, FROM_304);
        let resp = cache.on_open(&req).unwrap().unwrap();
        assert_eq!(resp.body_bytes().unwrap().as_ref(), b"replayed");
    }

    #[test]
    fn http_list_splitting_respects_quotes() {
        assert_eq!(split_http_list("no-cache, max-age=60"), vec!["no-cache", "max-age=60"]);
        assert_eq!(split_http_list(r#"a="x,y", b"#), vec![r#"a="x,y""#, "b"]);
        assert!(split_http_list("").is_empty());
    }

    #[test]
    fn directive_views() {
        let mut headers = HeaderMap::new();
        headers.insert("cache-control", HeaderValue::from_static("No-Cache, max-age=\"60\""));
        headers.insert("pragma", HeaderValue::from_static("no-store"));
        let directives = Directives::parse(&headers);

        assert!(directives.flag("no-cache"));
        assert!(directives.flag("no-store"));
        assert_eq!(directives.value("max-age"), Some(60));
        assert!(!directives.flag("private"));
    }
}
