//! `fabric-bridge`: serves the asset API over a single ledger connection.
//!
//! Configuration comes from the environment (see `BridgeConfig::from_env`),
//! plus `LISTEN_ADDR`/`PORT` for the listener, `RUST_LOG` for the filter
//! and `LOG_FORMAT=json` for structured output.

use std::net::SocketAddr;

use fabric_bridge_api::{ServeError, listen_addr_from_lookup};
use fabric_bridge_gateway::{BridgeConfig, TransactionDispatcher, bootstrap};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "fabric-bridge stopped");
        std::process::exit(err.exit_code());
    }
}

async fn run() -> Result<(), ServeError> {
    let config = BridgeConfig::from_env()?;
    let addr: SocketAddr = listen_addr_from_lookup(|key| std::env::var(key).ok())?;

    tracing::info!(
        peer = config.peer_endpoint(),
        channel = config.channel_name(),
        contract = config.contract_name(),
        "connecting to ledger network"
    );
    let (manager, contract) = bootstrap(&config).await?;
    let dispatcher = TransactionDispatcher::new(contract, config.timeouts());

    let drained =
        fabric_bridge_api::run(&manager, dispatcher, addr, config.drain_timeout(), shutdown_signal())
            .await?;

    tracing::info!(drained, "shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
