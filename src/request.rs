//! Client request line parsing.
//!
//! Only absolute-form `GET http://host[:port][/path] VERSION` lines are
//! accepted. Anything else is a [`ParseError`], which the forwarding engine
//! answers with `400 Bad Request` without touching the origin or the cache.

use crate::error::ParseError;
use crate::hasher::{canonical_url, create_cache_key, CacheKey};
use crate::DEFAULT_HTTP_PORT;

const SCHEME: &str = "http://";

/// A validated client request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    /// Always starts with `/`.
    pub path: String,
}

impl Request {
    /// Canonical URL the cache key is derived from.
    pub fn url(&self) -> String {
        canonical_url(&self.host, self.port, &self.path)
    }

    /// Paths with a query component bypass the cache entirely.
    pub fn is_dynamic(&self) -> bool {
        self.path.contains('?')
    }

    pub fn cache_key(&self) -> CacheKey {
        create_cache_key(&self.host, self.port, &self.path)
    }

    /// The request sent upstream. HTTP/1.0 makes the origin close after one
    /// response, which is how the end of the response is detected.
    pub fn origin_request(&self) -> String {
        format!("GET {} HTTP/1.0\r\nHost: {}\r\n\r\n", self.path, self.host)
    }
}

/// Parse the request line of a raw client request buffer. Leading blank
/// lines are skipped; anything after the request line is ignored.
pub fn parse_request(data: &[u8]) -> Result<Request, ParseError> {
    let start = skip_blank(data);
    let end = request_line_end(data).unwrap_or(data.len());
    let line = std::str::from_utf8(&data[start..end]).map_err(|_| ParseError::NotUtf8)?;
    parse_request_line(line.trim_end_matches('\r'))
}

/// Index of the `\n` terminating the request line, if it has arrived.
pub(crate) fn request_line_end(data: &[u8]) -> Option<usize> {
    let start = skip_blank(data);
    data[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|idx| start + idx)
}

fn skip_blank(data: &[u8]) -> usize {
    data.iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len())
}

pub fn parse_request_line(line: &str) -> Result<Request, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [method, target, version] = tokens[..] else {
        return Err(match tokens.len() {
            0 => ParseError::Empty,
            n => ParseError::TokenCount(n),
        });
    };

    if method != "GET" {
        return Err(ParseError::Method(method.to_string()));
    }

    let url = parse_target(target)?;
    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        host: url.host,
        port: url.port,
        path: url.path,
    })
}

#[derive(Debug, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

/// Decomposition states for an absolute URL.
enum Stage<'a> {
    Scheme(&'a str),
    Host(&'a str),
    Port {
        authority: &'a str,
        path: &'a str,
    },
}

fn parse_target(target: &str) -> Result<Target, ParseError> {
    let mut stage = Stage::Scheme(target);
    loop {
        stage = match stage {
            Stage::Scheme(rest) => match rest.strip_prefix(SCHEME) {
                Some(rest) => Stage::Host(rest),
                None => return Err(ParseError::Scheme(target.to_string())),
            },
            // First '/' splits authority from path; no '/' means the root path.
            Stage::Host(rest) => match rest.find('/') {
                Some(idx) => Stage::Port {
                    authority: &rest[..idx],
                    path: &rest[idx..],
                },
                None => Stage::Port {
                    authority: rest,
                    path: "/",
                },
            },
            Stage::Port { authority, path } => {
                let (host, port) = match authority.split_once(':') {
                    Some((host, port)) => (
                        host,
                        port.parse::<u16>()
                            .map_err(|_| ParseError::Port(port.to_string()))?,
                    ),
                    None => (authority, DEFAULT_HTTP_PORT),
                };
                if host.is_empty() {
                    return Err(ParseError::EmptyHost);
                }
                return Ok(Target {
                    host: host.to_string(),
                    port,
                    path: path.to_string(),
                });
            }
        };
    }
}
