//! Background Expiry Sweeper
//!
//! A background task that periodically scans the store for expired keys and
//! removes them ("active expiry"). Reads check deadlines themselves, so the
//! sweeper only reclaims memory held by keys nobody reads again. Its timing
//! never changes what a client observes.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sweeps every shard
//! 2. Logs how many keys were removed
//! 3. Sleeps for a fixed interval (default: 100ms)

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval between sweeps
    pub interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped. The server
/// keeps it alive for the lifetime of the process.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use respkv::storage::{StorageEngine, ExpirySweeper, ExpiryConfig};
    /// use std::sync::Arc;
    ///
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(engine, ExpiryConfig::default());
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// ```
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        Self { shutdown_tx }
    }

    /// Stops the expiry sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            debug!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let expired = engine.sweep_expired();

        if expired > 0 {
            let stats = engine.stats();
            debug!(
                expired = expired,
                keys_remaining = stats.keys,
                expired_total = stats.expired,
                "Expired keys cleaned up"
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    trace!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
