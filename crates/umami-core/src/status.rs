// ── Cycle status ──
//
// The externally visible outcome of the most recent refresh cycle. Backed
// by a `watch` channel so health handlers read it lock-free and tests can
// await the next cycle instead of sleeping.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// Point-in-time view of the refresh history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSnapshot {
    /// Whether the most recent finished cycle listed websites successfully.
    pub success: bool,
    /// Completion time of the most recent committed cycle.
    pub last_success: Option<DateTime<Utc>>,
    /// Number of cycles that committed or failed (cancelled ones excluded).
    pub cycles: u64,
}

#[derive(Debug)]
pub struct CycleStatus {
    state: watch::Sender<CycleSnapshot>,
}

impl Default for CycleStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStatus {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CycleSnapshot::default());
        Self { state }
    }

    pub fn last_cycle_success(&self) -> bool {
        self.state.borrow().success
    }

    /// Unix seconds of the last committed cycle; `0` before the first.
    pub fn last_cycle_timestamp(&self) -> i64 {
        self.state
            .borrow()
            .last_success
            .map_or(0, |at| at.timestamp())
    }

    pub fn snapshot(&self) -> CycleSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CycleSnapshot> {
        self.state.subscribe()
    }

    /// Marks a committed cycle finished at `at`.
    pub fn record_success(&self, at: DateTime<Utc>) {
        self.state.send_modify(|s| {
            s.success = true;
            s.last_success = Some(at);
            s.cycles += 1;
        });
    }

    /// Marks the last cycle failed; the last success time is kept.
    pub fn record_failure(&self) {
        self.state.send_modify(|s| {
            s.success = false;
            s.cycles += 1;
        });
    }
}
