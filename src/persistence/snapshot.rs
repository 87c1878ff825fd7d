//! Snapshot Module
//!
//! On-disk representation of the cache and the save/load operations.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{PersistenceError, PersistenceResult};

/// Schema version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

// == Wire Types ==
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<SnapshotRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    key: String,
    /// Base64 so arbitrary (non-UTF-8) bodies survive the JSON encoding
    value: String,
    expires_at: DateTime<Utc>,
}

// == Encode ==
/// Serializes every entry in `store`, expired or not.
pub fn encode_snapshot(store: &CacheStore) -> PersistenceResult<Vec<u8>> {
    let entries = store
        .all_entries()
        .into_iter()
        .map(|(key, entry)| SnapshotRecord {
            key,
            value: STANDARD.encode(&entry.value),
            expires_at: entry.expires_at,
        })
        .collect();

    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        entries,
    };
    Ok(serde_json::to_vec(&file)?)
}

// == Decode ==
/// Parses a snapshot back into entries. Expired entries are kept.
pub fn decode_snapshot(data: &[u8]) -> PersistenceResult<HashMap<String, CacheEntry>> {
    let file: SnapshotFile = serde_json::from_slice(data)?;
    if file.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: file.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    file.entries
        .into_iter()
        .map(|record| -> PersistenceResult<(String, CacheEntry)> {
            let value = STANDARD
                .decode(&record.value)
                .map_err(|source| PersistenceError::Decode {
                    key: record.key.clone(),
                    source,
                })?;
            let entry = CacheEntry::with_expiration(Bytes::from(value), record.expires_at);
            Ok((record.key, entry))
        })
        .collect()
}

// == Save ==
/// Writes a snapshot of `store` to `path`, replacing any previous one.
///
/// The data goes to a sibling temp file first and is renamed into place, so
/// readers of `path` see either the old snapshot or the complete new one.
pub fn save(store: &CacheStore, path: &Path) -> PersistenceResult<()> {
    let data = encode_snapshot(store)?;
    let tmp = tmp_path(path);

    let written = write_synced(&tmp, &data).and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

// == Load ==
/// Reads the snapshot at `path` into a new store using `default_ttl` for
/// future insertions.
pub fn load(path: &Path, default_ttl: Duration) -> PersistenceResult<CacheStore> {
    let data = fs::read(path)?;
    let entries = decode_snapshot(&data)?;
    Ok(CacheStore::from_entries(default_ttl, entries))
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
