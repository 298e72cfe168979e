use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

/// Width of a cache key in hex characters.
pub const KEY_LEN: usize = 32;

/// Fixed-width hexadecimal digest of a canonical URL. Doubles as the cache file name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a URL into its cache key. Stable across runs: xxh3 is seedless here.
pub fn hash_url(url: &str) -> CacheKey {
    CacheKey(format!("{:032x}", xxh3_128(url.as_bytes())))
}

/// `http://{host}:{port}{path}`, always with an explicit port.
pub fn canonical_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{host}:{port}{path}")
}

pub fn create_cache_key(host: &str, port: u16, path: &str) -> CacheKey {
    hash_url(&canonical_url(host, port, path))
}
