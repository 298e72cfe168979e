//! Both cache backends honor the same CacheStore contract.
use bytes::Bytes;
use rustyproxy::*;
use std::time::Duration;
use tempfile::TempDir;

async fn check_store_contract<C: CacheStore>(cache: &C) {
    let key = hash_url("http://example.com:80/page");
    let other = hash_url("http://example.com:80/other");
    let body = Bytes::from_static(b"HTTP/1.0 200 OK\r\nX-Header: value\r\n\r\nbody\r\n\r\nmore");

    assert_eq!(cache.lookup(&key).await, CacheStatus::MISSING);
    assert!(matches!(cache.read(&key).await, Err(CacheError::NotFound(_))));

    cache.write(&key, body.clone()).await.unwrap();
    let status = cache.lookup(&key).await;
    assert!(status.found && status.fresh);
    assert_eq!(cache.read(&key).await.unwrap(), body);

    // Entries are independent of each other.
    assert_eq!(cache.lookup(&other).await, CacheStatus::MISSING);

    cache.write(&key, Bytes::new()).await.unwrap();
    assert!(cache.read(&key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disk_cache_contract() {
    let dir = TempDir::new().unwrap();
    let cache = DiskCache::open(dir.path().join("cache"), Duration::from_secs(60)).unwrap();
    check_store_contract(&cache).await;
}

#[tokio::test]
async fn test_memory_cache_contract() {
    let cache = MemoryCache::new(Duration::from_secs(60));
    check_store_contract(&cache).await;
}

#[tokio::test]
async fn test_zero_ttl_is_never_fresh() {
    let dir = TempDir::new().unwrap();
    let disk = DiskCache::open(dir.path().join("cache"), Duration::ZERO).unwrap();
    let memory = MemoryCache::new(Duration::ZERO);
    let key = hash_url("http://example.com:80/page");

    disk.write(&key, Bytes::from_static(b"x")).await.unwrap();
    memory.write(&key, Bytes::from_static(b"x")).await.unwrap();

    for status in [disk.lookup(&key).await, memory.lookup(&key).await] {
        assert!(status.found);
        assert!(!status.fresh);
    }
}

#[tokio::test]
async fn test_open_creates_nested_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a").join("b").join("cache");
    let cache = DiskCache::open(&path, Duration::from_secs(1)).unwrap();
    assert!(path.is_dir());
    assert_eq!(cache.dir(), path.as_path());
    assert_eq!(cache.ttl(), Duration::from_secs(1));
}
