//! Background liveness sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::controller::AdmissionController;

/// Spawns the periodic sweep. Stops when `cancel` fires.
pub fn spawn_sweeper(
    controller: Arc<AdmissionController>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(interval_ms = interval.as_millis() as u64, "Liveness sweeper started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = controller.sweep_stale();
                    debug!(evicted, active = controller.connection_count(), "Sweep tick");
                }
            }
        }
        info!("Liveness sweeper stopped");
    })
}
