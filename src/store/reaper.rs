//! Background Expiry Reaper
//!
//! This module implements a background task that periodically sweeps the
//! store for expired entries and removes them. This is "active expiry" as
//! opposed to the "lazy expiry" that happens on access.
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry (checking on access) is efficient but has a problem:
//! if a key expires and is never accessed again, it stays in memory forever.
//!
//! The reaper solves this by periodically sweeping every shard.
//!
//! ## Design
//!
//! The reaper runs as a Tokio task and:
//! 1. Sleeps for a configurable interval (default: 2s)
//! 2. Wakes up and sweeps every shard, one write lock at a time
//! 3. Logs statistics about the sweep
//!
//! Each shard's sweep is isolated inside the store: a panic while sweeping
//! one shard never stops the sweep of the others, and never kills this task.
//!
//! ## Adaptive Frequency
//!
//! If many entries are expiring, the reaper runs more frequently.
//! If few entries are expiring, it backs off to save CPU.

use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Base interval between sweeps (default: 2s)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 100ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 30s)
    pub max_interval: Duration,

    /// If this fraction of stored keys expired in one sweep, speed up
    pub speedup_threshold: f64,

    /// If this fraction of stored keys expired in one sweep, slow down
    pub slowdown_threshold: f64,
}

impl ReaperConfig {
    /// A fixed-interval configuration with the adaptive bounds pinned to the
    /// interval itself.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            base_interval: interval,
            min_interval: interval,
            max_interval: interval,
            ..Default::default()
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(2),
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(30),
            speedup_threshold: 0.25,  // Speed up if >25% of keys expired
            slowdown_threshold: 0.01, // Slow down if <1% of keys expired
        }
    }
}

/// A handle to the running reaper.
///
/// When this handle is dropped, the reaper task is stopped.
#[derive(Debug)]
pub struct Reaper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl Reaper {
    /// Starts the reaper as a background task.
    ///
    /// # Arguments
    ///
    /// * `store` - The store to sweep
    /// * `config` - Sweep interval configuration
    ///
    /// # Returns
    ///
    /// A handle that stops the reaper when dropped (or when `stop` is
    /// called).
    ///
    /// # Example
    ///
    /// ```ignore
    /// use vitalgrid::store::{Store, Reaper, ReaperConfig};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(Store::new(16));
    /// let reaper = Reaper::start(Arc::clone(&store), ReaperConfig::default());
    ///
    /// // Reaper sweeps in the background...
    ///
    /// drop(reaper); // stops the task
    /// ```
    pub fn start(store: Arc<Store>, config: ReaperConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reaper_loop(store, config, shutdown_rx));

        info!("Background expiry reaper started");

        Self { shutdown_tx }
    }

    /// Stops the reaper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry reaper stopped");
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main reaper loop.
async fn reaper_loop(store: Arc<Store>, config: ReaperConfig, mut shutdown_rx: watch::Receiver<bool>) {
    let mut current_interval = config.base_interval;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Reaper received shutdown signal");
                    return;
                }
            }
        }

        let keys_before = store.len();
        let expired = store.sweep_expired();

        // Adjust interval based on expiry rate
        if keys_before > 0 {
            let expiry_rate = expired as f64 / keys_before as f64;

            if expiry_rate > config.speedup_threshold {
                current_interval = (current_interval / 2).max(config.min_interval);
                debug!(
                    expired = expired,
                    rate = %format!("{:.2}%", expiry_rate * 100.0),
                    new_interval_ms = current_interval.as_millis(),
                    "High expiry rate, speeding up reaper"
                );
            } else if expiry_rate < config.slowdown_threshold && expired == 0 {
                current_interval = (current_interval * 2).min(config.max_interval);
                trace!(
                    new_interval_ms = current_interval.as_millis(),
                    "Low expiry rate, slowing down reaper"
                );
            }
        }

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = store.len(),
                "Expired entries reaped"
            );
        }
    }
}

/// Starts the reaper with a fixed sweep interval.
///
/// This is a convenience function for simple use cases.
pub fn start_reaper(store: Arc<Store>, interval: Duration) -> Reaper {
    Reaper::start(store, ReaperConfig::fixed(interval))
}
