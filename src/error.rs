use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::hasher::CacheKey;

/// Why a client request line was rejected. Every variant answers `400 Bad Request`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("request line is not valid UTF-8")]
    NotUtf8,
    #[error("request line exceeds {0} bytes")]
    TooLarge(usize),
    #[error("expected 3 tokens in request line, got {0}")]
    TokenCount(usize),
    #[error("unsupported method: {0}")]
    Method(String),
    #[error("target is not an absolute http:// URL: {0}")]
    Scheme(String),
    #[error("target has an empty host")]
    EmptyHost,
    #[error("invalid port: {0}")]
    Port(String),
}

/// Failure to reach the origin. The cache is never consulted or updated after one of these.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },
    #[error("{0} resolved to no addresses")]
    NoAddress(String),
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: std::net::SocketAddr,
        source: io::Error,
    },
    #[error("timed out connecting to {0}")]
    Timeout(String),
}

impl ConnectError {
    /// Status line sent to the client when the origin cannot be reached.
    pub fn status(&self) -> &'static str {
        match self {
            ConnectError::Timeout(_) => "504 Gateway Timeout",
            _ => "502 Bad Gateway",
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache entry for {0}")]
    NotFound(CacheKey),
    #[error("cache I/O on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Usage: {0} <port> <timeout>")]
    Usage(String),
    #[error("invalid listen port: {0}")]
    Port(String),
    #[error("invalid cache timeout: {0}")]
    Ttl(String),
}
