//! Application state shared across the proxy handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::config::{Config, UPSTREAM_TIMEOUT};
use crate::proxy::{InFlight, UpstreamClient};

/// Shared handles for every request task.
///
/// The store is owned by the lifecycle coordinator; the state only carries
/// another `Arc` to it.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache store
    pub cache: Arc<CacheStore>,
    /// Client for the origin
    pub upstream: UpstreamClient,
    /// TTL applied to freshly fetched entries
    pub ttl: Duration,
    /// Present when concurrent misses should share a fetch
    pub in_flight: Option<Arc<InFlight>>,
}

impl AppState {
    /// Creates state that caches with the store's default TTL.
    pub fn new(cache: Arc<CacheStore>, upstream: UpstreamClient) -> Self {
        Self {
            ttl: cache.default_ttl(),
            cache,
            upstream,
            in_flight: None,
        }
    }

    /// Enables single-flight fetching.
    pub fn with_single_flight(mut self) -> Self {
        self.in_flight = Some(Arc::new(InFlight::new()));
        self
    }

    /// Builds state from configuration around an already-loaded store.
    pub fn from_config(config: &Config, cache: Arc<CacheStore>) -> reqwest::Result<Self> {
        let upstream = UpstreamClient::new(config.upstream_url.clone(), UPSTREAM_TIMEOUT)?;
        let state = Self {
            ttl: config.ttl,
            ..Self::new(cache, upstream)
        };

        Ok(if config.single_flight {
            state.with_single_flight()
        } else {
            state
        })
    }
}
