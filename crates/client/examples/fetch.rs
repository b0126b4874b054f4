//! Fetch a URL through the full pipeline and print the decoded body.
//!
//! To run this example:
//! ```bash
//! cargo run --example fetch -- https://example.com/feed.xml
//! ```
//!
//! The cache backend is picked from the environment (`CACHE`,
//! `SQLITE_PATH`, `CACHE_SIZE`, ...), so repeated runs against the same
//! URL with a sqlite cache exercise conditional revalidation.

use std::time::Duration;

use feedgrab_client::{FetchOptions, Fetcher, FollowTarget};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let url = std::env::args().nth(1).unwrap_or_else(|| "https://example.com/".to_string());

    let fetcher = Fetcher::from_env()?;
    let options = FetchOptions {
        timeout: Some(Duration::from_secs(10)),
        follow: Some(FollowTarget::Rss),
        ..FetchOptions::default()
    };

    let result = fetcher.adv_get(&url, &options)?;
    eprintln!(
        "fetched {} ({}; charset {}; {} bytes)",
        result.url,
        result.content_type,
        result.encoding,
        result.body.len()
    );
    println!("{}", String::from_utf8_lossy(&result.body));

    Ok(())
}
