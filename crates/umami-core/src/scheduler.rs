// ── Periodic scheduler ──
//
// Runs one cycle immediately, then one per interval. Cycles run inline in
// the scheduler task, so a slow cycle delays the next tick instead of
// overlapping it.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::refresh::Refresher;
use crate::sink::MetricSink;
use crate::source::AnalyticsSource;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

pub struct Scheduler<S, K> {
    refresher: Refresher<S, K>,
    interval: Duration,
}

impl<S: AnalyticsSource, K: MetricSink> Scheduler<S, K> {
    /// A zero `interval` falls back to [`DEFAULT_REFRESH_INTERVAL`].
    pub fn new(refresher: Refresher<S, K>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            interval
        };
        Self {
            refresher,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drive cycles until `cancel` fires. A cycle in progress observes the
    /// same token and winds down before this returns.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "refresh scheduler started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.refresher.run_cycle(&cancel).await;
                    debug!(?outcome, "cycle done");
                }
            }
        }

        info!("refresh scheduler stopped");
    }

    /// Run the scheduler on its own task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
