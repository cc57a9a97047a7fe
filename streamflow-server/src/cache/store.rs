//! Key-value media backing the station cache.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use moka::future::Cache as MokaCache;
use sha2::{Digest, Sha256};

/// Default capacity of the in-memory store.
const DEFAULT_MEMORY_CAPACITY: u64 = 1000;

/// Errors from a key-value medium.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A byte-oriented key-value medium.
///
/// Each `set` must replace the value for a key atomically: a concurrent
/// `get` sees either the old bytes or the new bytes, never a mix.
pub trait KeyValueStore: Send + Sync {
    /// Read the value for a key.
    fn get(&self, key: &str) -> impl Future<Output = Option<Vec<u8>>> + Send;

    /// Write the value for a key.
    fn set(&self, key: &str, value: Vec<u8>)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = ()> + Send;
}

/// In-process store.
#[derive(Clone)]
pub struct MemoryStore {
    entries: MokaCache<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create a store holding at most `max_capacity` keys.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: MokaCache::builder().max_capacity(max_capacity).build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) {
        self.entries.invalidate(key).await;
    }
}

/// Persistent store: one file per key inside a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// File holding `key`.
    ///
    /// Keys may hold ':' and '/' and grow with the number of ids in a batch,
    /// so the name is the base64url SHA-256 of the key: 43 characters for
    /// any key.
    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(digest)))
    }

    fn tmp_path(&self) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(".tmp-{}-{}", std::process::id(), n))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        tokio::fs::read(self.path_for(key)).await.ok()
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write aside, then rename over the target so readers never see a
        // half-written entry.
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path_for(key)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) {
        let _ = tokio::fs::remove_file(self.path_for(key)).await;
    }
}
