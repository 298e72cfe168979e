//! Cache storage.
//!
//! [`CacheStore`] is the seam between the forwarding engine and storage.
//! [`DiskCache`] keeps one flat file per key under the cache directory and
//! uses the file's modification time as the only freshness signal.

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::hasher::CacheKey;

/// Result of a cache lookup. A found-but-stale entry counts as a miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStatus {
    pub found: bool,
    pub fresh: bool,
}

impl CacheStatus {
    pub const MISSING: CacheStatus = CacheStatus {
        found: false,
        fresh: false,
    };

    pub fn is_hit(&self) -> bool {
        self.found && self.fresh
    }
}

pub trait CacheStore: Send + Sync + 'static {
    /// Existence and freshness of the entry under `key`. Storage errors read as missing.
    fn lookup(&self, key: &CacheKey) -> impl Future<Output = CacheStatus> + Send;

    /// The stored bytes, verbatim. Freshness is the caller's concern.
    fn read(&self, key: &CacheKey) -> impl Future<Output = Result<Bytes, CacheError>> + Send;

    /// Replace the entry under `key`. Readers see the old or the new bytes, never a mix.
    fn write(&self, key: &CacheKey, data: Bytes)
        -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Whether an entry last written at `written` is still within `ttl`.
/// Timestamps in the future count as age zero.
pub(crate) fn is_fresh(written: SystemTime, ttl: Duration) -> bool {
    let age = SystemTime::now()
        .duration_since(written)
        .unwrap_or_default();
    age < ttl
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    /// Open (creating if needed) a cache directory. On Unix it is created owner-only.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|e| CacheError::io(&dir, e))?;
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    fn temp_path_for(&self, key: &CacheKey) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq))
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

impl CacheStore for DiskCache {
    async fn lookup(&self, key: &CacheKey) -> CacheStatus {
        let path = self.path_for(key);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Cache lookup failed for {}: {}", path.display(), e);
                }
                return CacheStatus::MISSING;
            }
        };
        match meta.modified() {
            Ok(written) => CacheStatus {
                found: true,
                fresh: is_fresh(written, self.ttl),
            },
            Err(e) => {
                warn!("No modification time for {}: {}", path.display(), e);
                CacheStatus {
                    found: true,
                    fresh: false,
                }
            }
        }
    }

    async fn read(&self, key: &CacheKey) -> Result<Bytes, CacheError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound(key.clone())),
            Err(e) => Err(CacheError::io(path, e)),
        }
    }

    async fn write(&self, key: &CacheKey, data: Bytes) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let tmp = self.temp_path_for(key);

        if let Err(e) = tokio::fs::write(&tmp, &data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(tmp, e));
        }
        // rename(2) replaces the target atomically within one directory.
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::io(path, e));
        }
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}
