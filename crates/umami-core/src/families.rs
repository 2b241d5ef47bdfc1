//! Gauge family names and label layouts published by the refresher.

/// `1` if the last cycle listed websites successfully, `0` otherwise.
pub const FETCH_SUCCESS: &str = "umami_fetch_success";
/// Unix timestamp of the last committed cycle.
pub const LAST_FETCH_TIMESTAMP: &str = "umami_last_fetch_timestamp_seconds";

pub const WEBSITE_PAGEVIEWS: &str = "umami_website_pageviews";
pub const WEBSITE_VISITORS: &str = "umami_website_visitors";
pub const WEBSITE_VISITS: &str = "umami_website_visits";
pub const WEBSITE_BOUNCES: &str = "umami_website_bounces";
pub const WEBSITE_TOTALTIME_SECONDS: &str = "umami_website_totaltime_seconds";
pub const WEBSITE_ACTIVE_VISITORS: &str = "umami_website_active_visitors";
pub const METRIC_VALUE: &str = "umami_metric_value";

/// Labels of every per-website family.
pub const WEBSITE_LABELS: [&str; 3] = ["website_id", "name", "domain"];
/// Labels of [`METRIC_VALUE`].
pub const METRIC_VALUE_LABELS: [&str; 5] = ["website_id", "name", "domain", "type", "value"];

/// Families rebuilt from scratch on every cycle.
pub const PER_WEBSITE: [&str; 7] = [
    WEBSITE_PAGEVIEWS,
    WEBSITE_VISITORS,
    WEBSITE_VISITS,
    WEBSITE_BOUNCES,
    WEBSITE_TOTALTIME_SECONDS,
    WEBSITE_ACTIVE_VISITORS,
    METRIC_VALUE,
];

/// Published in place of an empty breakdown label.
pub const EMPTY_LABEL: &str = "<empty>";

/// Normalize a breakdown label: trimmed, never empty.
pub fn label_value(raw: Option<&str>) -> &str {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(EMPTY_LABEL)
}
