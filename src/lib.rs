//! Forwarding HTTP proxy with a read-through disk cache.
//!
//! Clients send absolute-form `GET http://...` requests. Responses for
//! non-dynamic URLs are stored verbatim, one file per URL, and served from
//! disk until they are older than the configured TTL.

pub mod cache;
pub mod config;
pub mod error;
pub mod forward;
pub mod hasher;
pub mod memory;
pub mod origin;
pub mod request;
pub mod server;

use std::time::Duration;

pub use cache::{CacheStatus, CacheStore, DiskCache};
pub use config::Config;
pub use error::{CacheError, ConfigError, ConnectError, ParseError};
pub use forward::{Forwarder, Outcome};
pub use hasher::{canonical_url, create_cache_key, hash_url, CacheKey};
pub use memory::MemoryCache;
pub use request::{parse_request, parse_request_line, Request};
pub use server::Server;

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_CACHE_DIR: &str = "./cache";
/// Upper bound on the client request line.
pub const MAX_REQUEST_SIZE: usize = 8192;
pub const READ_CHUNK: usize = 8192;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a finished connection keeps draining client input before closing.
pub const CLIENT_LINGER: Duration = Duration::from_secs(1);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Synthetic status-only response used for every error the proxy reports itself.
pub fn error_response(status: &str) -> String {
    format!("HTTP/1.1 {status}\r\nContent-Type: N/A\r\nContent-Length: 0\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        assert_eq!(
            error_response("400 Bad Request"),
            "HTTP/1.1 400 Bad Request\r\nContent-Type: N/A\r\nContent-Length: 0\r\n\r\n"
        );
    }
}
