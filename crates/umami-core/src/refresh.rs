// ── Refresh cycle ──
//
// One pass over Umami: list websites, reset the per-website families,
// fan out one unit per website under a concurrency limit, then commit
// the cycle status. Only the listing can fail a cycle; a unit that loses
// some of its fetches publishes what it got and moves on.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use umami_api::{Error, MetricType, Website};

use crate::families::{
    FETCH_SUCCESS, LAST_FETCH_TIMESTAMP, METRIC_VALUE, PER_WEBSITE, WEBSITE_ACTIVE_VISITORS,
    WEBSITE_BOUNCES, WEBSITE_PAGEVIEWS, WEBSITE_TOTALTIME_SECONDS, WEBSITE_VISITORS,
    WEBSITE_VISITS, label_value,
};
use crate::sink::MetricSink;
use crate::source::AnalyticsSource;
use crate::status::CycleStatus;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_METRIC_LIMIT: u32 = 100;

/// Tuning for a refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of website units in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Row cap for each breakdown query; `None` sends no limit.
    pub metric_limit: Option<u32>,
    /// Breakdowns fetched for every website.
    pub metric_types: Vec<MetricType>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            metric_limit: Some(DEFAULT_METRIC_LIMIT),
            metric_types: MetricType::DEFAULTS.to_vec(),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every listed website was processed and the status committed.
    Committed {
        websites: usize,
        /// Individual stats/active/breakdown calls that failed.
        failed_fetches: usize,
    },
    /// The website listing failed; nothing but the success gauge changed.
    ListingFailed,
    /// Cancellation stopped the cycle before it could commit. `joined`
    /// counts dispatched units that returned, including ones whose calls
    /// were abandoned on cancellation.
    Cancelled { joined: usize },
}

/// Drives refresh cycles against a source and a sink.
///
/// Cheaply cloneable; clones share the source, sink and status.
pub struct Refresher<S, K> {
    inner: Arc<RefresherInner<S, K>>,
}

struct RefresherInner<S, K> {
    source: S,
    sink: Arc<K>,
    status: Arc<CycleStatus>,
    config: RefreshConfig,
}

impl<S, K> Clone for Refresher<S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AnalyticsSource, K: MetricSink> Refresher<S, K> {
    pub fn new(source: S, sink: Arc<K>, status: Arc<CycleStatus>, config: RefreshConfig) -> Self {
        Self {
            inner: Arc::new(RefresherInner {
                source,
                sink,
                status,
                config,
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn status(&self) -> &Arc<CycleStatus> {
        &self.inner.status
    }

    pub fn sink(&self) -> &Arc<K> {
        &self.inner.sink
    }

    /// Run one full cycle.
    ///
    /// Cancellation stops dispatching new websites and unblocks in-flight
    /// calls; units already running are joined before returning.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleOutcome {
        let started = Instant::now();
        let sink = &self.inner.sink;
        debug!("refresh cycle starting");

        let websites = match until_cancelled(cancel, self.inner.source.websites()).await {
            Ok(websites) => websites,
            Err(Error::Cancelled) => {
                info!("refresh cycle cancelled during listing");
                return CycleOutcome::Cancelled { joined: 0 };
            }
            Err(e) => {
                warn!(error = %e, "failed to list websites");
                sink.set_gauge(FETCH_SUCCESS, &[], 0.0);
                self.inner.status.record_failure();
                return CycleOutcome::ListingFailed;
            }
        };

        // Drop series of websites that vanished upstream. Readers may see
        // the families empty until the units below refill them.
        for family in PER_WEBSITE {
            sink.reset_family(family);
        }

        let total = websites.len();
        let limit = Arc::new(Semaphore::new(self.inner.config.concurrency.max(1)));
        let mut units = JoinSet::new();
        let mut cancelled = false;

        for website in websites {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&limit).acquire_owned() => permit,
            };
            // The semaphore is never closed.
            let Ok(permit) = permit else { break };

            let refresher = self.clone();
            let cancel = cancel.clone();
            units.spawn(async move {
                let _permit = permit;
                refresher.refresh_website(&website, &cancel).await
            });
        }

        let mut joined = 0;
        let mut failed_fetches = 0;
        while let Some(unit) = units.join_next().await {
            match unit {
                Ok(failures) => {
                    joined += 1;
                    failed_fetches += failures;
                }
                Err(e) => {
                    warn!(error = %e, "website unit aborted");
                    failed_fetches += 1;
                }
            }
        }

        // Units abandon their calls on cancellation and return normally, so
        // a token fired after the last dispatch must still block the commit.
        if cancelled || cancel.is_cancelled() {
            info!(joined, total, "refresh cycle cancelled");
            return CycleOutcome::Cancelled { joined };
        }

        let now = Utc::now();
        self.inner.status.record_success(now);
        sink.set_gauge(FETCH_SUCCESS, &[], 1.0);
        sink.set_gauge(LAST_FETCH_TIMESTAMP, &[], unix_seconds(now));

        info!(
            websites = total,
            failed_fetches,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "refresh cycle finished"
        );

        CycleOutcome::Committed {
            websites: total,
            failed_fetches,
        }
    }

    /// Fetch and publish everything for one website. Returns the number of
    /// calls that failed.
    async fn refresh_website(&self, website: &Website, cancel: &CancellationToken) -> usize {
        let inner = &*self.inner;
        let sink = &inner.sink;
        let id = website.id.as_str();
        let labels = [id, website.name.as_str(), website.domain()];
        let mut failures = 0;

        match until_cancelled(cancel, inner.source.stats(id)).await {
            Ok(stats) => {
                for (family, stat) in [
                    (WEBSITE_PAGEVIEWS, stats.pageviews),
                    (WEBSITE_VISITORS, stats.visitors),
                    (WEBSITE_VISITS, stats.visits),
                    (WEBSITE_BOUNCES, stats.bounces),
                    (WEBSITE_TOTALTIME_SECONDS, stats.totaltime),
                ] {
                    sink.set_gauge(family, &labels, stat.value);
                }
            }
            Err(e) => {
                failures += 1;
                log_fetch_error(id, "stats", &e);
            }
        }

        match until_cancelled(cancel, inner.source.active(id)).await {
            Ok(active) => sink.set_gauge(WEBSITE_ACTIVE_VISITORS, &labels, active.visitors),
            Err(e) => {
                failures += 1;
                log_fetch_error(id, "active", &e);
            }
        }

        for &metric_type in &inner.config.metric_types {
            if cancel.is_cancelled() {
                break;
            }

            let fetch = inner.source.metrics(id, metric_type, inner.config.metric_limit);
            match until_cancelled(cancel, fetch).await {
                Ok(entries) => {
                    for entry in entries {
                        let series = [
                            id,
                            website.name.as_str(),
                            website.domain(),
                            metric_type.as_ref(),
                            label_value(entry.x.as_deref()),
                        ];
                        sink.set_gauge(METRIC_VALUE, &series, entry.y);
                    }
                }
                Err(e) => {
                    failures += 1;
                    log_fetch_error(id, metric_type.as_ref(), &e);
                }
            }
        }

        failures
    }
}

/// Race `fut` against the cancellation token.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn log_fetch_error(website_id: &str, what: &str, err: &Error) {
    if matches!(err, Error::Cancelled) {
        debug!(website_id, what, "fetch abandoned on cancellation");
    } else {
        warn!(website_id, what, error = %err, "fetch failed; skipping measurement");
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn unix_seconds(at: DateTime<Utc>) -> f64 {
    // Exact for any timestamp below 2^53.
    at.timestamp() as f64
}
