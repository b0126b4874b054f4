//! Character-encoding detection for fetched bodies.
//!
//! Servers lie about charsets, pages declare them in three different
//! places, and plenty declare nothing at all. Detection is a fixed
//! waterfall with first hit winning: transport headers, then in-body
//! declarations, then statistical detection, then `utf-8`. One
//! post-correction applies: `gb2312` is reported as `gbk`, its strict
//! superset, because real-world pages labelled gb2312 routinely contain
//! GBK-only code points.

use chardetng::EncodingDetector;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use mime::Mime;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::trace;

// how much of the body the in-band declarations may occupy
const DECLARATION_WINDOW: usize = 1000;
// how much of the tail feeds the statistical detector
const DETECTION_WINDOW: usize = 2000;

static CHARSET_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"charset=["']?([0-9a-zA-Z-]+)"#).expect("valid charset pattern"));

static ENCODING_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"encoding=["']?([0-9a-zA-Z-]+)"#).expect("valid encoding pattern"));

/// Returns the charset label for `data`, consulting `headers` when given.
pub fn detect_encoding(data: &[u8], headers: Option<&HeaderMap>) -> String {
    let label = detect_raw_encoding(data, headers);

    if label.eq_ignore_ascii_case("gb2312") { "gbk".to_string() } else { label }
}

fn detect_raw_encoding(data: &[u8], headers: Option<&HeaderMap>) -> String {
    if let Some(headers) = headers {
        // a bare `charset` response header, rare but seen in the wild
        if let Some(label) = headers.get("charset").and_then(|v| v.to_str().ok()) {
            return label.trim().to_string();
        }

        if let Some(label) = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| ct.parse::<Mime>().ok())
            .and_then(|mime| mime.get_param(mime::CHARSET).map(|cs| cs.as_str().to_string()))
        {
            return label;
        }
    }

    let head = &data[..data.len().min(DECLARATION_WINDOW)];
    for pattern in [&CHARSET_DECLARATION, &ENCODING_DECLARATION] {
        if let Some(captures) = pattern.captures(head) {
            let label = String::from_utf8_lossy(&captures[1]).to_lowercase();
            trace!(label, "charset declared in body");
            return label;
        }
    }

    let tail = &data[data.len().saturating_sub(DETECTION_WINDOW)..];
    if !tail.is_ascii() {
        let mut detector = EncodingDetector::new();
        detector.feed(tail, true);
        let guess = detector.guess(None, true);
        // a plain UTF-8 guess adds nothing over the fallthrough below
        if guess != encoding_rs::UTF_8 {
            let label = guess.name().to_lowercase();
            trace!(label, "charset detected statistically");
            return label;
        }
    }

    "utf-8".to_string()
}
