use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::DEFAULT_CACHE_DIR;

/// Process configuration, built once from the command line and handed to the
/// server and cache explicitly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub listen_port: u16,
    pub cache_ttl: Duration,
    pub cache_dir: PathBuf,
}

impl Config {
    /// Parse `<prog> <port> <timeout>`.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let prog = args.first().cloned().unwrap_or_else(|| "proxy".to_string());
        let [_, port, ttl] = args.as_slice() else {
            return Err(ConfigError::Usage(prog));
        };

        let listen_port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::Port(port.clone()))?;
        let ttl_secs = ttl
            .parse::<u64>()
            .map_err(|_| ConfigError::Ttl(ttl.clone()))?;

        Ok(Self {
            listen_port,
            cache_ttl: Duration::from_secs(ttl_secs),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        })
    }

    /// All interfaces, on the configured port.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listen_port))
    }
}
