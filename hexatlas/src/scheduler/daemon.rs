//! Timer pump for the render scheduler.
//!
//! Drives [`RenderScheduler::tick`] on a fixed short interval, exactly one
//! tile per tick, until cancelled. The interval gap is the cooperative
//! yield that keeps materialization from monopolizing the executor; true
//! parallelism is deliberately absent so the cache and queue keep a single
//! logical owner.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RenderScheduler, TickOutcome};

/// Default tick interval; short enough to feel immediate, long enough to
/// leave the view responsive between tiles.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Long-running pump that materializes queued tiles one per tick.
pub struct SchedulerDaemon {
    scheduler: Arc<Mutex<RenderScheduler>>,
    interval: Duration,
}

impl SchedulerDaemon {
    pub fn new(scheduler: Arc<Mutex<RenderScheduler>>) -> Self {
        Self {
            scheduler,
            interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Override the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Each interval tick processes at most one tile; an empty queue makes
    /// the tick a no-op until a compositing pass enqueues new work.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Scheduler daemon starting");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Scheduler daemon shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let outcome = self.scheduler.lock().tick();
                    if let TickOutcome::Failed(key) = outcome {
                        debug!(tile = ?key, "Materialization failed this tick");
                    }
                }
            }
        }
    }

    /// Tick synchronously until the queue drains.
    ///
    /// Batch-mode helper for hosts that want a fully materialized viewport
    /// before presenting (snapshot export, tests). Returns the number of
    /// tiles processed, successfully or not.
    pub fn drain(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.scheduler.lock().tick() {
                TickOutcome::Idle => break,
                _ => processed += 1,
            }
        }
        processed
    }
}
