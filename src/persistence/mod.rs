//! Persistence Module
//!
//! Saves the cache to a snapshot file at shutdown and restores it at startup.

mod snapshot;

pub use snapshot::{decode_snapshot, encode_snapshot, load, save, SNAPSHOT_VERSION};
