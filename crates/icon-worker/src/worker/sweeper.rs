//! Returns expired claim-mode leases to the main queue.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::queue::JobQueue;

const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Half the visibility timeout, clamped to 1-60 s.
pub fn sweep_interval(visibility_timeout: Duration) -> Duration {
    (visibility_timeout / 2).clamp(MIN_INTERVAL, MAX_INTERVAL)
}

/// Sweeps every `interval` until `shutdown` changes or closes.
///
/// Give it its own queue client: the worker's client spends most of its time
/// blocked in a pop.
pub async fn run_sweeper(
    queue: Arc<dyn JobQueue>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut requeued = 0;

    debug!("Lease sweeper started (every {:?})", interval);
    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                match queue.requeue_expired().await {
                    Ok(0) => {}
                    Ok(n) => {
                        info!("Requeued {} job(s) with expired leases", n);
                        requeued += n;
                    }
                    Err(e) => warn!("Failed to requeue expired leases: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Lease sweeper stopped");
    requeued
}

pub fn spawn_sweeper(
    queue: Arc<dyn JobQueue>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<usize> {
    tokio::spawn(run_sweeper(queue, interval, shutdown))
}
