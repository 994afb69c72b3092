//! respkv server entry point.
//!
//! Parses the command line, sets up logging, creates the shared storage
//! engine and sweeper, and accepts connections until the process is stopped.

use respkv::commands::CommandHandler;
use respkv::config::{self, Config, Invocation};
use respkv::connection::{handle_connection, ConnectionStats};
use respkv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            println!("{}", config::usage());
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("respkv version {}", respkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", config::usage());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!(version = respkv::VERSION, "Starting respkv");

    // One store for the whole process, handed to every connection and the sweeper
    let storage = Arc::new(StorageEngine::new());

    let _sweeper = ExpirySweeper::start(
        Arc::clone(&storage),
        ExpiryConfig {
            interval: config.sweep_interval,
        },
    );

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, storage, stats) => {}
        _ = shutdown => {}
    }

    Ok(())
}

/// Pause after the first failed accept.
const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);

/// Longest pause between accept retries.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Doubles the accept retry pause, up to `ACCEPT_BACKOFF_MAX`.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(ACCEPT_BACKOFF_MAX)
}

/// Accepts connections forever, spawning one task per client.
///
/// Accept failures such as running out of file descriptors tend to repeat,
/// so each consecutive failure waits longer before the next attempt.
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    let mut backoff = ACCEPT_BACKOFF_START;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                backoff = ACCEPT_BACKOFF_START;

                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(handle_connection(stream, addr, handler, stats));
            }
            Err(e) => {
                error!(
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Failed to accept connection"
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        }
    }
}
