//! Refresh engine that turns Umami analytics into gauge snapshots.
//!
//! - **[`Refresher`]** runs one cycle: list websites, clear the
//!   per-website families, fan out a bounded number of website units,
//!   then commit the [`CycleStatus`]. A failed listing is the only thing
//!   that fails a cycle.
//! - **[`Scheduler`]** runs a cycle at startup and then once per interval,
//!   never overlapping, until its [`CancellationToken`] fires.
//! - **[`MetricSink`]** is the write side of the gauge registry.
//!   [`MemorySink`] is an in-process implementation.
//! - **[`AnalyticsSource`]** is what the refresher reads from; the
//!   `umami_api::ApiClient` implements it.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod families;
pub mod refresh;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod status;

// ── Primary re-exports ──────────────────────────────────────────────
pub use refresh::{
    CycleOutcome, DEFAULT_CONCURRENCY, DEFAULT_METRIC_LIMIT, RefreshConfig, Refresher,
};
pub use scheduler::{DEFAULT_REFRESH_INTERVAL, Scheduler};
pub use sink::{MemorySink, MetricSink};
pub use source::AnalyticsSource;
pub use status::{CycleSnapshot, CycleStatus};
