//! Cache Proxy - A caching reverse proxy for GET requests
//!
//! Serves minified upstream responses from a TTL cache that survives
//! restarts through an on-disk snapshot.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod normalize;
pub mod persistence;
pub mod proxy;
pub mod tasks;

pub use config::Config;
pub use lifecycle::Coordinator;
pub use proxy::{create_router, AppState};
pub use tasks::spawn_sweep_task;
