//! Per-connection forwarding engine.
//!
//! One [`Forwarder::handle`] call drives a client connection through
//! `read -> parse -> cache check -> (serve cached | fetch, stream, store) -> close`.

use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::ParseError;
use crate::hasher::CacheKey;
use crate::origin;
use crate::request::{parse_request, request_line_end, Request};
use crate::{
    error_response, CLIENT_LINGER, CLIENT_READ_TIMEOUT, CONNECT_TIMEOUT, MAX_REQUEST_SIZE,
    READ_CHUNK,
};

/// How a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Request failed to parse; client got `400 Bad Request`.
    Rejected,
    ServedFromCache,
    /// Streamed live from the origin. `cached` is whether the response was stored.
    Fetched { cached: bool },
    /// Origin could not be reached; client got a gateway error.
    OriginUnreachable,
    /// Client went away or never sent a request. Nothing was sent.
    Dropped,
}

pub struct Forwarder<C> {
    cache: C,
    connect_timeout: Duration,
    client_read_timeout: Duration,
}

impl<C: CacheStore> Forwarder<C> {
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            connect_timeout: CONNECT_TIMEOUT,
            client_read_timeout: CLIENT_READ_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_client_read_timeout(mut self, client_read_timeout: Duration) -> Self {
        self.client_read_timeout = client_read_timeout;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Serve one client connection to completion, then close it.
    pub async fn handle<S>(&self, mut client: S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let outcome = self.relay(&mut client).await;
        if let Err(e) = client.shutdown().await {
            debug!("Client shutdown failed: {}", e);
        }
        discard_unread(&mut client, CLIENT_LINGER).await;
        outcome
    }

    async fn relay<S>(&self, client: &mut S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let head = match read_request_head(client, self.client_read_timeout).await {
            Ok(head) if head.is_empty() => return Outcome::Dropped,
            Ok(head) => head,
            Err(e) => {
                debug!("Failed to read client request: {}", e);
                return Outcome::Dropped;
            }
        };

        let line_len = request_line_end(&head).unwrap_or(head.len());
        let parsed = if line_len > MAX_REQUEST_SIZE {
            Err(ParseError::TooLarge(MAX_REQUEST_SIZE))
        } else {
            parse_request(&head)
        };
        let request = match parsed {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejected request: {}", e);
                return match send_status(client, "400 Bad Request").await {
                    Ok(()) => Outcome::Rejected,
                    Err(_) => Outcome::Dropped,
                };
            }
        };

        let url = request.url();
        let key = if request.is_dynamic() {
            debug!("Skipping cache for dynamic URL {}", url);
            None
        } else {
            Some(request.cache_key())
        };

        if let Some(key) = &key {
            if self.cache.lookup(key).await.is_hit() {
                match self.cache.read(key).await {
                    Ok(data) => {
                        info!("CACHE HIT: {} ({} bytes)", url, data.len());
                        return match client.write_all(&data).await {
                            Ok(()) => Outcome::ServedFromCache,
                            Err(e) => {
                                debug!("Client write failed for {}: {}", url, e);
                                Outcome::Dropped
                            }
                        };
                    }
                    Err(e) => warn!("Cache read failed for {}, fetching: {}", url, e),
                }
            } else {
                debug!("CACHE MISS: {}", url);
            }
        }

        self.fetch(client, &request, &url, key.as_ref()).await
    }

    async fn fetch<S>(
        &self,
        client: &mut S,
        request: &Request,
        url: &str,
        key: Option<&CacheKey>,
    ) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut upstream =
            match origin::connect(&request.host, request.port, self.connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Origin unreachable for {}: {}", url, e);
                    return match send_status(client, e.status()).await {
                        Ok(()) => Outcome::OriginUnreachable,
                        Err(_) => Outcome::Dropped,
                    };
                }
            };

        info!("Fetching {} from {}:{}", url, request.host, request.port);
        if let Err(e) = upstream
            .write_all(request.origin_request().as_bytes())
            .await
        {
            warn!("Failed to send request to origin for {}: {}", url, e);
            return match send_status(client, "502 Bad Gateway").await {
                Ok(()) => Outcome::OriginUnreachable,
                Err(_) => Outcome::Dropped,
            };
        }

        // Dynamic responses are forwarded chunk by chunk and never kept.
        let mut response = BytesMut::with_capacity(READ_CHUNK);
        let mut total = 0;
        let complete = loop {
            response.reserve(READ_CHUNK);
            let start = response.len();
            match upstream.read_buf(&mut response).await {
                Ok(0) => break true,
                Ok(n) => {
                    if total == 0 {
                        if let Some(code) = origin_status(&response[start..]) {
                            debug!("Origin answered {} for {}", code, url);
                        }
                    }
                    total += n;
                    if let Err(e) = client.write_all(&response[start..]).await {
                        debug!("Client write failed for {}: {}", url, e);
                        return Outcome::Dropped;
                    }
                    if key.is_none() {
                        response.clear();
                    }
                }
                Err(e) => {
                    warn!("Origin read failed for {} after {} bytes: {}", url, total, e);
                    break false;
                }
            }
        };
        drop(upstream);

        let Some(key) = key else {
            return Outcome::Fetched { cached: false };
        };
        if !complete || response.is_empty() {
            debug!("Not caching incomplete response for {}", url);
            return Outcome::Fetched { cached: false };
        }

        let len = response.len();
        match self.cache.write(key, response.freeze()).await {
            Ok(()) => {
                info!("CACHED: {} ({} bytes)", url, len);
                Outcome::Fetched { cached: true }
            }
            Err(e) => {
                warn!("Cache write failed for {}: {}", url, e);
                Outcome::Fetched { cached: false }
            }
        }
    }
}

/// Read until the request line is complete, EOF, or the size cap.
/// Headers that arrive in the same reads are kept but never waited for.
async fn read_request_head<S>(client: &mut S, read_timeout: Duration) -> io::Result<BytesMut>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);
    loop {
        match timeout(read_timeout, client.read_buf(&mut buffer)).await {
            Ok(Ok(0)) => return Ok(buffer),
            Ok(Ok(_)) => {
                if request_line_end(&buffer).is_some() || buffer.len() > MAX_REQUEST_SIZE {
                    return Ok(buffer);
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(io::ErrorKind::TimedOut.into()),
        }
    }
}

/// Drain what the client still sends (unread headers) until it closes or
/// `linger` runs out. Closing with unread input makes the kernel reset the
/// connection, which can discard a response still in flight.
async fn discard_unread<S>(client: &mut S, linger: Duration)
where
    S: AsyncRead + Unpin,
{
    let mut sink = [0u8; 1024];
    let mut discarded = 0;
    let drain = async {
        while discarded <= MAX_REQUEST_SIZE * 8 {
            match client.read(&mut sink).await {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n,
            }
        }
    };
    let _ = timeout(linger, drain).await;
}

async fn send_status<S>(client: &mut S, status: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    client
        .write_all(error_response(status).as_bytes())
        .await
        .map_err(|e| {
            debug!("Failed to send {} response: {}", status, e);
            e
        })
}

/// Status code from the start of an origin response, if the status line is there.
pub fn origin_status(data: &[u8]) -> Option<u16> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut response = httparse::Response::new(&mut headers);
    match response.parse(data) {
        Ok(_) => response.code,
        Err(_) => None,
    }
}
