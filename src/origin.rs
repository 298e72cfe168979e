use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::error::ConnectError;

/// Resolve `host` and open a TCP stream to the first address returned.
///
/// There is no fallback to later addresses. Resolution and the connect
/// itself share one `connect_timeout` budget.
pub async fn connect(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, ConnectError> {
    timeout(connect_timeout, connect_first(host, port))
        .await
        .map_err(|_| ConnectError::Timeout(format!("{host}:{port}")))?
}

async fn connect_first(host: &str, port: u16) -> Result<TcpStream, ConnectError> {
    let addr = lookup_host((host, port))
        .await
        .map_err(|source| ConnectError::Resolve {
            host: host.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ConnectError::NoAddress(host.to_string()))?;

    debug!("Connecting to {}:{} via {}", host, port, addr);
    TcpStream::connect(addr)
        .await
        .map_err(|source| ConnectError::Connect { addr, source })
}
