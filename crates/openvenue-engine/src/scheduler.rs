//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::engine::MarketEngine;

/// Periodically expires resting orders whose `expires_at` has passed.
///
/// The sweep itself is synchronous shard work, so each tick runs it on the
/// blocking pool. Ticks missed while a sweep is in flight are delayed, not
/// burst.
pub struct ExpirySweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    /// Start sweeping every `every`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(engine: Arc<MarketEngine>, every: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let interval_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX);
            tracing::info!(interval_ms, "Expiry sweeper started");
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let engine = Arc::clone(&engine);
                        match tokio::task::spawn_blocking(move || engine.expire_orders(Utc::now())).await {
                            Ok(0) => {}
                            Ok(n) => tracing::debug!(expired = n, "Sweep complete"),
                            Err(e) => tracing::error!(error = %e, "Sweep task failed"),
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Expiry sweeper stopped");
        });
        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Expiry sweeper did not stop cleanly");
        }
    }
}
