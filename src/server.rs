use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::forward::Forwarder;
use crate::SHUTDOWN_GRACE;

/// Accept loop. Every connection gets its own task; the loop never waits on one.
pub struct Server<C> {
    listener: TcpListener,
    forwarder: Arc<Forwarder<C>>,
    shutdown_grace: Duration,
}

impl<C: CacheStore> Server<C> {
    pub async fn bind(addr: impl ToSocketAddrs, forwarder: Forwarder<C>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            forwarder: Arc::new(forwarder),
            shutdown_grace: SHUTDOWN_GRACE,
        })
    }

    /// How long in-flight connections may keep running after shutdown is requested.
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves, then close the listener
    /// and give in-flight connections the grace period before aborting them.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) {
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        let forwarder = Arc::clone(&self.forwarder);
                        tasks.spawn(async move {
                            let outcome = forwarder.handle(client).await;
                            debug!("Connection from {} finished: {:?}", peer, outcome);
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        drop(self.listener);
        if tasks.is_empty() {
            return;
        }

        info!(
            "Waiting up to {:?} for {} in-flight connections",
            self.shutdown_grace,
            tasks.len()
        );
        let drain = async { while tasks.join_next().await.is_some() {} };
        if timeout(self.shutdown_grace, drain).await.is_err() {
            warn!("Aborting {} connections still in flight", tasks.len());
            tasks.abort_all();
        }
    }
}
