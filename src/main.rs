//! Disconnect Probe
//!
//! Startup order: configuration, cache client, listener. The startup notice
//! goes to stdout only after the listener is bound; all logs go to stderr.
//! The process exits 0 when any accepted connection closes.

use anyhow::Result;
use disconnect_probe::config::log_directive;
use disconnect_probe::{CacheClient, ProbeConfig, ProbeError, TerminationListener};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = ProbeConfig::from_env().map_err(fatal)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_directive(&config.log_level).map_err(fatal)?)
                .add_directive("redis=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        shards = config.cache_shards.len(),
        "Starting disconnect probe"
    );

    let mut cache = CacheClient::construct(config.cache_shards.clone()).map_err(fatal)?;
    if config.cache_debug {
        cache.enable_diagnostics();
    }

    let listener = TerminationListener::bind(config.port).await.map_err(fatal)?;
    println!("{}", listener.startup_notice());

    tokio::select! {
        event = listener.serve() => {
            info!(
                connection_id = event.connection_id,
                peer = %event.peer,
                reason = ?event.reason,
                "Connection close observed"
            );
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!(
        shards = cache.shard_count(),
        diagnostics = cache.diagnostics_enabled(),
        "Probe exiting"
    );
    Ok(())
}

/// Log a startup failure with the component that caused it
fn fatal(err: ProbeError) -> anyhow::Error {
    let component = err.component();
    error!(component, error = %err, "Startup failed");
    anyhow::Error::new(err).context(format!("{component} failed to start"))
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
