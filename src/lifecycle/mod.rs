//! Lifecycle Module
//!
//! Owns the cache for the life of the process.
//!
//! # Phases
//! `Starting -> Serving -> Draining -> Stopped`
//! 1. Starting: load the snapshot, falling back to an empty cache
//! 2. Serving: run the proxy until a shutdown signal arrives
//! 3. Draining: write the snapshot within [`SHUTDOWN_SAVE_BUDGET`]
//! 4. Stopped: done, whether or not the save succeeded

mod signals;

use std::future::{Future, IntoFuture};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::config::{Config, SHUTDOWN_SAVE_BUDGET};
use crate::error::PersistenceResult;
use crate::persistence;
use crate::proxy::{create_router, AppState};
use crate::tasks::spawn_sweep_task;

pub use signals::shutdown_signal;

/// Where the coordinator is in the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// Process-wide owner of the cache store.
pub struct Coordinator {
    config: Config,
    cache: Arc<CacheStore>,
    phase: Phase,
}

impl Coordinator {
    /// Loads the snapshot named in `config` and prepares to serve.
    pub fn start(config: Config) -> Self {
        let cache = Arc::new(load_or_empty(&config.snapshot_path, config.ttl));
        Self {
            config,
            cache,
            phase: Phase::Starting,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Shared handle on the store.
    pub fn cache(&self) -> Arc<CacheStore> {
        Arc::clone(&self.cache)
    }

    /// Serves on `listener` until `shutdown` resolves, then saves the
    /// snapshot.
    ///
    /// In-flight requests are not awaited; a fetch finishing after the
    /// snapshot is taken is not in it. Save failures are logged, never
    /// returned.
    pub async fn serve<F>(&mut self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let state = AppState::from_config(&self.config, self.cache())
            .context("failed to build upstream client")?;
        let app = create_router(state);
        let sweep_handle = self
            .config
            .sweep_every()
            .map(|interval| spawn_sweep_task(self.cache(), interval));

        self.phase = Phase::Serving;
        info!(
            "server listening on {}, forwarding to {}",
            listener.local_addr()?,
            self.config.upstream_url
        );

        tokio::select! {
            result = axum::serve(listener, app).into_future() => {
                if let Err(err) = result {
                    error!("server error: {}", err);
                }
            }
            () = shutdown => {
                info!("shutting down");
            }
        }

        self.phase = Phase::Draining;
        if let Some(handle) = sweep_handle {
            handle.abort();
        }

        match save_with_budget(self.cache(), self.config.snapshot_path.clone(), SHUTDOWN_SAVE_BUDGET).await {
            Ok(()) => info!("cache saved ({} items)", self.cache.count()),
            Err(err) => error!("error writing cache: {:#}", err),
        }

        let stats = self.cache.stats();
        info!(
            "final stats: hits={}, misses={}, hit_rate={:.2}, purged={}",
            stats.hits,
            stats.misses,
            stats.hit_rate(),
            stats.expired_purged
        );

        self.phase = Phase::Stopped;
        Ok(())
    }
}

/// Runs the proxy for the whole process lifetime.
///
/// Only failing to bind the listen address is an error.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::start(config);
    let listener = TcpListener::bind(&coordinator.config.addr)
        .await
        .with_context(|| format!("failed to bind {}", coordinator.config.addr))?;

    coordinator.serve(listener, shutdown_signal()).await
}

/// Loads the snapshot at `path`, or returns an empty store if it is missing
/// or unreadable.
pub fn load_or_empty(path: &Path, ttl: Duration) -> CacheStore {
    match persistence::load(path, ttl) {
        Ok(store) => {
            info!("loaded cache ({} items)", store.count());
            store
        }
        Err(err) => {
            warn!("error loading cache: {}", err);
            CacheStore::new(ttl)
        }
    }
}

/// Writes the snapshot on a blocking thread, giving up after `budget`.
///
/// The write goes through a temp file, so an abandoned save never truncates
/// the previous snapshot.
pub async fn save_with_budget(
    cache: Arc<CacheStore>,
    path: PathBuf,
    budget: Duration,
) -> anyhow::Result<()> {
    blocking_within(budget, move || persistence::save(&cache, &path)).await
}

/// Runs a blocking write on the blocking pool and waits at most `budget`.
/// An abandoned write keeps running; the caller just stops waiting for it.
async fn blocking_within<F>(budget: Duration, write: F) -> anyhow::Result<()>
where
    F: FnOnce() -> PersistenceResult<()> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(write);

    tokio::time::timeout(budget, task)
        .await
        .map_err(|_| anyhow!("snapshot not written within {:?}", budget))?
        .context("snapshot task failed")?
        .context("snapshot write failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_load_or_empty_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = load_or_empty(&dir.path().join("absent"), TTL);
        assert_eq!(store.count(), 0);
        assert_eq!(store.default_ttl(), TTL);
    }

    #[test]
    fn test_load_or_empty_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.snapshot");
        std::fs::write(&path, b"{\"version\":1,\"entr").unwrap();

        assert_eq!(load_or_empty(&path, TTL).count(), 0);
    }

    #[tokio::test]
    async fn test_save_with_budget_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.snapshot");
        let cache = Arc::new(CacheStore::new(TTL));
        cache.set_default("/a", Bytes::from_static(b"1"));

        tokio_test::assert_ok!(save_with_budget(cache, path.clone(), SHUTDOWN_SAVE_BUDGET).await);
        assert_eq!(load_or_empty(&path, TTL).count(), 1);
    }

    #[tokio::test]
    async fn test_save_with_budget_reports_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing/dir/cache.snapshot");
        let cache = Arc::new(CacheStore::new(TTL));

        tokio_test::assert_err!(save_with_budget(cache, path, SHUTDOWN_SAVE_BUDGET).await);
    }

    #[tokio::test]
    async fn test_slow_write_abandoned_after_budget() {
        let started = std::time::Instant::now();

        let result = blocking_within(Duration::from_millis(50), || {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .await;

        let err = tokio_test::assert_err!(result);
        assert!(err.to_string().contains("not written within"), "{}", err);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_serve_stops_and_saves_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            snapshot_path: dir.path().join("cache.snapshot"),
            ..Config::default()
        };

        let mut coordinator = Coordinator::start(config.clone());
        assert_eq!(coordinator.phase(), Phase::Starting);
        coordinator.cache().set_default("/k", Bytes::from_static(b"v"));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        coordinator.serve(listener, async {}).await.unwrap();

        assert_eq!(coordinator.phase(), Phase::Stopped);
        assert_eq!(Coordinator::start(config).cache().count(), 1);
    }
}
