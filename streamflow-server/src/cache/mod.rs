//! Expiring station cache.
//!
//! Station lists are stored as `{"data": [...], "timestamp": <epoch ms>}`
//! under a namespaced key. Entries are evicted lazily: an expired or
//! unreadable entry is removed the next time someone asks for it.
//!
//! Caching is best-effort. Reads degrade to a miss and writes never fail the
//! caller.

mod fingerprint;
mod store;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::station::StationRecord;

pub use fingerprint::{Fingerprint, canonical_uuids};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

/// Default TTL: 30 minutes.
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Key prefix. The version suffix changes whenever the entry layout does,
/// so older entries are never read again.
pub const DEFAULT_KEY_PREFIX: &str = "streamflow_station_cache_v6_";

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Configuration for the station cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid.
    pub ttl: Duration,
    /// Prefix prepended to every fingerprint.
    pub key_prefix: String,
}

impl CacheConfig {
    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set a custom key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    data: Vec<StationRecord>,
    timestamp: i64,
}

/// Station cache over a key-value medium.
pub struct StationCache<S, C = SystemClock> {
    store: S,
    clock: C,
    config: CacheConfig,
}

impl<S: KeyValueStore> StationCache<S> {
    /// Create a cache using the system clock.
    pub fn new(store: S, config: CacheConfig) -> Self {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> StationCache<S, C> {
    /// Create a cache with an explicit clock.
    pub fn with_clock(store: S, config: CacheConfig, clock: C) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    fn key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}{}", self.config.key_prefix, fingerprint)
    }

    /// Look up a fresh entry.
    ///
    /// Returns `None` on a miss, on expiry, or if the stored bytes do not
    /// decode; in the last two cases the entry is removed.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Vec<StationRecord>> {
        let key = self.key(fingerprint);
        let bytes = self.store.get(&key).await?;

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "Evicting corrupt cache entry");
                self.store.remove(&key).await;
                return None;
            }
        };

        // A timestamp in the future counts as age zero.
        let age_ms = self.clock.now_millis().saturating_sub(entry.timestamp).max(0);
        if age_ms as u128 >= self.config.ttl.as_millis() {
            debug!(key = %key, age_ms, "Evicting expired cache entry");
            self.store.remove(&key).await;
            return None;
        }

        Some(entry.data)
    }

    /// Store a station list under a fingerprint, replacing any prior entry.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn put(&self, fingerprint: &Fingerprint, data: &[StationRecord]) {
        let key = self.key(fingerprint);
        let entry = CacheEntry {
            data: data.to_vec(),
            timestamp: self.clock.now_millis(),
        };

        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.store.set(&key, bytes).await {
            debug!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// The underlying medium.
    pub fn store(&self) -> &S {
        &self.store
    }
}
