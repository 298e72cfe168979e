use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

use crate::cache::{is_fresh, CacheStatus, CacheStore};
use crate::error::CacheError;
use crate::hasher::CacheKey;

#[derive(Clone, Debug)]
struct StoredEntry {
    data: Bytes,
    stored_at: SystemTime,
}

/// In-process backend that keeps explicit stored-at metadata instead of
/// relying on file timestamps. Clones share the same entries.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<CacheKey, StoredEntry>>>,
    ttl: Duration,
    lookups: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            lookups: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Backdate an entry, as if it had been written `age` ago.
    pub async fn age_entry(&self, key: &CacheKey, age: Duration) {
        if let Some(entry) = self.entries.lock().await.get_mut(key) {
            entry.stored_at = SystemTime::now() - age;
        }
    }

    /// Number of `lookup` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Number of successful `write` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl CacheStore for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> CacheStatus {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        match self.entries.lock().await.get(key) {
            Some(entry) => CacheStatus {
                found: true,
                fresh: is_fresh(entry.stored_at, self.ttl),
            },
            None => CacheStatus::MISSING,
        }
    }

    async fn read(&self, key: &CacheKey) -> Result<Bytes, CacheError> {
        self.entries
            .lock()
            .await
            .get(key)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| CacheError::NotFound(key.clone()))
    }

    async fn write(&self, key: &CacheKey, data: Bytes) -> Result<(), CacheError> {
        let entry = StoredEntry {
            data,
            stored_at: SystemTime::now(),
        };
        self.entries.lock().await.insert(key.clone(), entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
