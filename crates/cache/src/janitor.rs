//! Periodic cache trimming on a daemon thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::store::CacheStore;

/// Default pause between trim passes (`CACHE_LIFESPAN`).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Re-arms a `trim` of the shared store every `interval`.
///
/// The worker thread is detached (process exit does not wait for it) and
/// holds only a weak handle, so dropping the last owner of the store ends
/// the loop on the next tick. [`Janitor::stop`] ends it explicitly.
#[derive(Debug)]
pub struct Janitor {
    stop: Arc<AtomicBool>,
}

impl Janitor {
    /// Trims once immediately, then spawns the periodic worker.
    pub fn start(store: Weak<dyn CacheStore>, interval: Duration) -> Self {
        if let Some(store) = store.upgrade() {
            store.trim();
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let builder = thread::Builder::new().name("cache-janitor".to_string());
        let spawned = builder.spawn(move || {
            loop {
                thread::sleep(interval);
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                let Some(store) = store.upgrade() else {
                    break;
                };
                trace!("janitor trim pass");
                store.trim();
            }
            debug!("cache janitor stopped");
        });
        if let Err(e) = spawned {
            debug!(error = %e, "failed to spawn cache janitor");
        }

        Self { stop }
    }

    /// Asks the worker to exit after its current sleep.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::record::CacheRecord;
    use http::HeaderMap;

    #[test]
    fn trims_periodically_until_stopped() {
        let store = Arc::new(MemoryStore::new(1));
        store.set("http://a/", CacheRecord::new(200, "OK", &HeaderMap::new(), vec![], 1));
        store.set("http://b/", CacheRecord::new(200, "OK", &HeaderMap::new(), vec![], 2));

        let store_dyn: Arc<dyn CacheStore> = store.clone();
        let weak: Weak<dyn CacheStore> = Arc::downgrade(&store_dyn);
        let janitor = Janitor::start(weak, Duration::from_millis(10));

        // the initial pass already ran synchronously
        assert_eq!(store.len(), 1);

        store.set("http://c/", CacheRecord::new(200, "OK", &HeaderMap::new(), vec![], 3));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while store.len() > 1 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.len(), 1);

        janitor.stop();
    }
}
