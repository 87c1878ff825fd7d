//! In-flight fetch registry
//!
//! Lets concurrent misses for the same key queue behind one upstream fetch.
//! Only used when single-flight is enabled; by default every miss fetches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

/// Per-key gate shared by the tasks missing on that key.
pub type FetchGate = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub struct InFlight {
    gates: Mutex<HashMap<String, FetchGate>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gate for `key`, creating it if no fetch is registered.
    ///
    /// Holders lock the gate, re-check the store, and fetch only if the
    /// entry is still missing.
    pub fn gate(&self, key: &str) -> FetchGate {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(key.to_string()).or_default().clone()
    }

    /// Drops the registry's handle on `gate` once the fetch it guarded is over.
    ///
    /// A newer gate registered under the same key is left alone.
    pub fn release(&self, key: &str, gate: &FetchGate) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if gates.get(key).is_some_and(|current| Arc::ptr_eq(current, gate)) {
            gates.remove(key);
        }
    }

    /// Number of keys with a registered gate.
    pub fn len(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
