//! Cache Proxy - A caching reverse proxy for GET requests
//!
//! Forwards cache misses to the upstream origin, stores minified bodies with
//! a TTL, and snapshots the cache to disk on shutdown.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_proxy::{lifecycle, Config};

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Parse configuration from flags and environment variables
/// 3. Load the cache snapshot, or start empty
/// 4. Start the expiry sweep and the HTTP server
/// 5. On SIGINT/SIGTERM, save the snapshot and exit
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    info!(
        "Configuration loaded: upstream={}, ttl={:?}, addr={}, snapshot={}",
        config.upstream_url,
        config.ttl,
        config.addr,
        config.snapshot_path.display()
    );

    lifecycle::run(config).await?;

    info!("Server shutdown complete");
    // Exit without waiting on in-flight requests or a save abandoned past its budget
    std::process::exit(0);
}
