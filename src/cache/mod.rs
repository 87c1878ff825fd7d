//! Cache Module
//!
//! In-memory response cache with lazy TTL expiration.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatsRecorder};
pub use store::CacheStore;
