use tracing::info;

use rustyproxy::{Config, DiskCache, Forwarder, Server};

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::from_args(std::env::args()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rustyproxy=info".parse()?)
                .add_directive("proxy=info".parse()?),
        )
        .init();

    info!(
        "RustyProxy v{} - Forwarding HTTP Proxy with Disk Cache",
        env!("CARGO_PKG_VERSION")
    );

    let cache = DiskCache::open(&config.cache_dir, config.cache_ttl)?;
    let server = Server::bind(config.listen_addr(), Forwarder::new(cache)).await?;

    info!("Listening on {}", server.local_addr()?);
    info!(
        "Cache directory: {} (TTL: {}s)",
        config.cache_dir.display(),
        config.cache_ttl.as_secs()
    );

    server.serve(shutdown_signal()).await;
    info!("Shutting down proxy...");
    Ok(())
}
