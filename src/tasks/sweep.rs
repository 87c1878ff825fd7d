//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries, so
//! entries nobody asks for again do not accumulate between restarts.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that purges expired entries every `interval`.
///
/// Lookups already ignore expired entries; the sweep only reclaims memory.
/// The returned handle is aborted during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheStore::new(Duration::from_secs(300)));
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweep every {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}
