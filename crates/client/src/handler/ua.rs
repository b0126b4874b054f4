//! Browser-like User-Agent selection.

use http::HeaderValue;
use http::header::USER_AGENT;
use rand::seq::SliceRandom;

use crate::handler::Handler;
use crate::request::Request;

/// Real-world desktop browser strings; one is picked per pipeline.
//https://gist.github.com/fijimunkii/952acac988f2d25bef7e0284bc63c406
pub const USER_AGENT_POOL: [&str; 10] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.131 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.169 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:66.0) Gecko/20100101 Firefox/66.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.157 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/73.0.3683.103 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 6.2; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/68.0.3440.106 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.131 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:67.0) Gecko/20100101 Firefox/67.0",
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/74.0.3729.131 Safari/537.36",
];

/// Sets the `User-Agent` header (unredirected).
#[derive(Debug, Clone)]
pub struct UserAgent {
    value: HeaderValue,
}

impl UserAgent {
    /// Uses a fixed agent string.
    pub fn new(agent: &'static str) -> Self {
        Self { value: HeaderValue::from_static(agent) }
    }

    /// Picks an agent uniformly at random from the pool.
    pub fn random() -> Self {
        let agent = USER_AGENT_POOL
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENT_POOL[0]);
        Self::new(agent)
    }
}

impl Handler for UserAgent {
    fn on_request(&self, mut req: Request) -> Request {
        req.set_unredirected_header(USER_AGENT, self.value.clone());
        req
    }
}
