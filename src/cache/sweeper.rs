//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::cache::store::TaggedCache;

/// Periodically evicts expired entries so they do not hold memory until
/// their next lookup.
pub struct CacheSweeper {
    cache: Arc<TaggedCache>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(cache: Arc<TaggedCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Cache sweeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = self.cache.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = self.cache.len(), "Expired cache entries swept");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
