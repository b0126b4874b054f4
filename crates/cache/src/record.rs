//! The unit of storage shared by every cache backend.
//!
//! A [`CacheRecord`] is the five-field snapshot of one fetched response.
//! Headers are serialised into an RFC-822-style text block (`Name: value`
//! lines) so the same representation round-trips through SQL text columns
//! and the in-memory map alike.

use std::time::{SystemTime, UNIX_EPOCH};

use http::{HeaderMap, HeaderName, HeaderValue};

/// Seconds since the Unix epoch, saturating at zero for pre-epoch clocks.
pub fn epoch_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// One cached response, keyed externally by its pre-redirect request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// HTTP status code of the stored response
    pub status: u16,
    /// Reason phrase that accompanied the status line
    pub reason: String,
    /// Headers as an RFC-822-style block, one `Name: value` line each
    pub headers: String,
    /// Body bytes, stored post-decompression (`Content-Encoding: identity`)
    pub body: Vec<u8>,
    /// Epoch seconds at which the record was inserted or last refreshed
    pub timestamp: u64,
}

impl CacheRecord {
    /// Builds a record from response parts, serialising the header map.
    pub fn new(status: u16, reason: impl Into<String>, headers: &HeaderMap, body: Vec<u8>, timestamp: u64) -> Self {
        Self { status, reason: reason.into(), headers: write_header_block(headers), body, timestamp }
    }

    /// Parses the stored header block back into a header map.
    ///
    /// Lines that no longer form a valid header are skipped rather than
    /// failing the whole record.
    pub fn header_map(&self) -> HeaderMap {
        parse_header_block(&self.headers)
    }

    /// Age of the record in seconds relative to `now` (epoch seconds).
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

/// Serialises a header map into `Name: value\r\n` lines.
///
/// Values that are not valid UTF-8 are dropped; repeated names produce
/// repeated lines.
pub fn write_header_block(headers: &HeaderMap) -> String {
    let mut block = String::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            block.push_str(name.as_str());
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
    }
    block
}

/// Parses an RFC-822-style header block, skipping malformed lines.
pub fn parse_header_block(block: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in block.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.trim().as_bytes()),
            HeaderValue::from_str(value.trim()),
        ) else {
            continue;
        };
        headers.append(name, value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_block_round_trips() {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"abc\""));
        headers.insert("content-type", HeaderValue::from_static("text/html; charset=utf-8"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let record = CacheRecord::new(200, "OK", &headers, b"<rss/>".to_vec(), 42);
        let parsed = record.header_map();

        assert_eq!(parsed.get("etag").unwrap(), "\"abc\"");
        assert_eq!(parsed.get("content-type").unwrap(), "text/html; charset=utf-8");
        assert_eq!(parsed.get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let headers = parse_header_block("etag: \"x\"\r\nnot a header line\r\n: no name\r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("etag").unwrap(), "\"x\"");
    }

    #[test]
    fn age_is_relative_and_saturating() {
        let record = CacheRecord::new(200, "OK", &HeaderMap::new(), vec![], 100);
        assert_eq!(record.age(160), 60);
        assert_eq!(record.age(40), 0);
    }
}
