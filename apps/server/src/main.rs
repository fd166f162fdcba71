//! A2DP Server - standalone daemon for the A2DP session coordinator.
//!
//! Runs the coordinator against the in-process loopback stack and exposes it
//! over HTTP. Useful for integration testing of callers and for exercising
//! the admission and multicast policy without a radio.

mod config;

use std::path::PathBuf;

use a2dp_core::{bootstrap_loopback, settings_store_for, start_server, AppState, TokioSpawner};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use crate::config::ServerConfig;

/// A2DP Server - headless A2DP session coordinator.
#[derive(Parser, Debug)]
#[command(name = "a2dp-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "A2DP_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "A2DP_BIND_PORT")]
    port: Option<u16>,

    /// Provision the multicast feature (overrides config file).
    #[arg(short = 'm', long)]
    multicast: bool,

    /// Data directory for persisted device facts.
    #[arg(short = 'd', long, env = "A2DP_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("A2DP Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if args.multicast {
        config.multicast = true;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    log::info!(
        "Configuration: bind_port={}, max_connections={}, multicast={}, split_a2dp={:?}",
        config.bind_port,
        config.max_connections,
        config.multicast,
        config.split_a2dp
    );
    if let Some(ref data_dir) = config.data_dir {
        log::info!("Using data directory: {}", data_dir.display());
    }

    // Bootstrap services against the loopback stack
    let core_config = config.to_core_config();
    let settings = settings_store_for(&core_config);
    let services = bootstrap_loopback(&core_config, settings, TokioSpawner::current());

    log::info!("Services bootstrapped successfully");

    services.start_background_tasks();

    log::info!("Background tasks started");

    let app_state = AppState::new(&services);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown
    services.shutdown();

    // Abort the server task; handlers now see an unavailable coordinator
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
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
                log::error!("Failed to install SIGTERM handler: {}", e);
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
