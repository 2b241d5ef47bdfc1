// Umami API wire types
//
// Shapes returned by the website endpoints. Every numeric field is
// defaulted so that a Umami release dropping or renaming one of them
// degrades to zero instead of failing the whole decode.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// A tracked website.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Website {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Nullable upstream; a website without a domain publishes `""`.
    #[serde(default)]
    pub domain: Option<String>,
}

impl Website {
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or_default()
    }
}

/// Paged envelope of `GET /api/websites`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebsitePage {
    #[serde(default)]
    pub data: Vec<Website>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub page_size: Option<u64>,
}

/// A current value paired with the value of the previous period.
///
/// Older Umami releases send `{"value": n, "prev": m}`; newer ones send a
/// bare number and move the comparison elsewhere. Both decode here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatValue {
    pub value: f64,
    pub prev: f64,
}

impl<'de> Deserialize<'de> for StatValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Pair {
                #[serde(default)]
                value: f64,
                #[serde(default)]
                prev: f64,
            },
            Bare(f64),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Pair { value, prev } => Self { value, prev },
            Wire::Bare(value) => Self { value, prev: 0.0 },
        })
    }
}

/// Summary statistics of `GET /api/websites/{id}/stats`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WebsiteStats {
    #[serde(default)]
    pub pageviews: StatValue,
    #[serde(default)]
    pub visitors: StatValue,
    #[serde(default)]
    pub visits: StatValue,
    #[serde(default)]
    pub bounces: StatValue,
    /// Total time on site, in seconds.
    #[serde(default)]
    pub totaltime: StatValue,
}

/// Live visitor gauge of `GET /api/websites/{id}/active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct ActiveVisitors {
    pub visitors: f64,
}

/// One row of `GET /api/websites/{id}/metrics`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MetricEntry {
    /// Label value (URL path, referrer host, browser name...). Null for
    /// direct traffic and similar "unknown" buckets.
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: f64,
}

/// Breakdown dimension accepted by the metrics endpoint's `type` parameter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Url,
    Referrer,
    Browser,
    Os,
    Device,
    Country,
    Event,
    Title,
    Query,
    Language,
    Region,
    City,
    Host,
}

impl MetricType {
    /// The breakdowns exported when none are configured.
    pub const DEFAULTS: [Self; 7] = [
        Self::Url,
        Self::Referrer,
        Self::Browser,
        Self::Os,
        Self::Device,
        Self::Country,
        Self::Event,
    ];
}

/// Trailing time range sent as `startAt` / `endAt` millisecond epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_at: i64,
    pub end_at: i64,
}

impl TimeWindow {
    /// The window of length `span` ending at `now`.
    pub fn trailing(now: DateTime<Utc>, span: Duration) -> Self {
        Self {
            start_at: (now - span).timestamp_millis(),
            end_at: now.timestamp_millis(),
        }
    }

    pub(crate) fn query(self) -> [(&'static str, String); 2] {
        [
            ("startAt", self.start_at.to_string()),
            ("endAt", self.end_at.to_string()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn stat_value_accepts_object_and_bare_number() {
        let stats: WebsiteStats = serde_json::from_value(json!({
            "pageviews": { "value": 10, "prev": 5 },
            "visitors": 4,
            "totaltime": { "value": 120 }
        }))
        .unwrap();

        assert_eq!(stats.pageviews, StatValue { value: 10.0, prev: 5.0 });
        assert_eq!(stats.visitors, StatValue { value: 4.0, prev: 0.0 });
        assert_eq!(stats.totaltime.value, 120.0);
        assert_eq!(stats.bounces, StatValue::default());
    }

    #[test]
    fn website_domain_tolerates_null() {
        let site: Website =
            serde_json::from_value(json!({ "id": "w1", "name": "Blog", "domain": null })).unwrap();
        assert_eq!(site.domain(), "");
    }

    #[test]
    fn metric_entry_tolerates_null_label() {
        let entry: MetricEntry = serde_json::from_value(json!({ "x": null, "y": 3 })).unwrap();
        assert_eq!(entry.x, None);
        assert_eq!(entry.y, 3.0);
    }

    #[test]
    fn metric_type_parses_case_insensitively() {
        assert_eq!(MetricType::from_str("URL").unwrap(), MetricType::Url);
        assert_eq!(MetricType::from_str("os").unwrap(), MetricType::Os);
        assert!(MetricType::from_str("pageviews").is_err());
        assert_eq!(MetricType::Referrer.as_ref(), "referrer");
    }

    #[test]
    fn trailing_window_spans_requested_duration() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let window = TimeWindow::trailing(now, Duration::days(30));

        assert_eq!(window.end_at, 1_700_000_000_000);
        assert_eq!(window.end_at - window.start_at, 30 * 24 * 60 * 60 * 1000);
    }
}
