// ── Prometheus sink ──
//
// Backs `MetricSink` with `GaugeVec`s in a private registry. Every family
// the refresher writes is registered up front; writes to anything else are
// logged and dropped.

use std::collections::HashMap;

use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use umami_core::MetricSink;
use umami_core::families::{
    FETCH_SUCCESS, LAST_FETCH_TIMESTAMP, METRIC_VALUE, METRIC_VALUE_LABELS,
    WEBSITE_ACTIVE_VISITORS, WEBSITE_BOUNCES, WEBSITE_LABELS, WEBSITE_PAGEVIEWS,
    WEBSITE_TOTALTIME_SECONDS, WEBSITE_VISITORS, WEBSITE_VISITS,
};

const FAMILIES: [(&str, &str, &[&str]); 9] = [
    (
        FETCH_SUCCESS,
        "Whether the last refresh listed websites successfully (1) or not (0)",
        &[],
    ),
    (
        LAST_FETCH_TIMESTAMP,
        "Unix time of the last completed refresh",
        &[],
    ),
    (
        WEBSITE_PAGEVIEWS,
        "Page views over the stats window",
        &WEBSITE_LABELS,
    ),
    (
        WEBSITE_VISITORS,
        "Unique visitors over the stats window",
        &WEBSITE_LABELS,
    ),
    (WEBSITE_VISITS, "Visits over the stats window", &WEBSITE_LABELS),
    (
        WEBSITE_BOUNCES,
        "Bounced visits over the stats window",
        &WEBSITE_LABELS,
    ),
    (
        WEBSITE_TOTALTIME_SECONDS,
        "Total time spent on the website over the stats window",
        &WEBSITE_LABELS,
    ),
    (
        WEBSITE_ACTIVE_VISITORS,
        "Visitors active right now",
        &WEBSITE_LABELS,
    ),
    (
        METRIC_VALUE,
        "Breakdown value per dimension over the stats window",
        &METRIC_VALUE_LABELS,
    ),
];

pub struct PrometheusSink {
    registry: Registry,
    families: HashMap<&'static str, GaugeVec>,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let mut families = HashMap::with_capacity(FAMILIES.len());

        for (name, help, labels) in FAMILIES {
            let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
            registry.register(Box::new(gauge.clone()))?;
            families.insert(name, gauge);
        }

        Ok(Self { registry, families })
    }

    /// Render the registry in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl MetricSink for PrometheusSink {
    fn set_gauge(&self, name: &str, labels: &[&str], value: f64) {
        let Some(family) = self.families.get(name) else {
            warn!(family = name, "write to unregistered gauge family dropped");
            return;
        };

        match family.get_metric_with_label_values(labels) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!(family = name, error = %e, "gauge write dropped"),
        }
    }

    fn reset_family(&self, name: &str) {
        if let Some(family) = self.families.get(name) {
            family.reset();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn writes_render_as_text() {
        let sink = PrometheusSink::new().unwrap();
        sink.set_gauge(WEBSITE_PAGEVIEWS, &["1", "A", "a.com"], 10.0);
        sink.set_gauge(FETCH_SUCCESS, &[], 1.0);

        let text = sink.encode().unwrap();
        assert!(text.contains("# TYPE umami_website_pageviews gauge"));
        assert!(
            text.contains(r#"umami_website_pageviews{domain="a.com",name="A",website_id="1"} 10"#),
            "{text}"
        );
        assert!(text.contains("umami_fetch_success 1"));
    }

    #[test]
    fn bad_writes_are_dropped() {
        let sink = PrometheusSink::new().unwrap();
        sink.set_gauge("umami_not_registered", &[], 1.0);
        sink.set_gauge(WEBSITE_PAGEVIEWS, &["only-one-label"], 1.0);
        sink.reset_family("umami_not_registered");

        let text = sink.encode().unwrap();
        assert!(!text.contains("umami_not_registered"));
        assert!(!text.contains("only-one-label"));
    }

    #[test]
    fn reset_drops_every_series_of_the_family() {
        let sink = PrometheusSink::new().unwrap();
        let series = ["1", "A", "a.com", "url", "/"];
        sink.set_gauge(METRIC_VALUE, &series, 3.0);
        sink.set_gauge(WEBSITE_VISITS, &["1", "A", "a.com"], 4.0);

        sink.reset_family(METRIC_VALUE);

        let text = sink.encode().unwrap();
        assert!(!text.contains("umami_metric_value{"));
        assert!(text.contains("umami_website_visits{"));
    }
}
