// ── Metric sink contract ──
//
// The refresh engine writes gauges through `MetricSink` and never sees the
// registry behind it. `MemorySink` is the in-process implementation used by
// tests and by embedders that read values back directly.

use dashmap::DashMap;

/// Destination for gauge values, keyed by family name and label tuple.
///
/// Implementations must accept concurrent writes from many website units;
/// writes from different units never share a label tuple.
pub trait MetricSink: Send + Sync + 'static {
    /// Set the gauge `name{labels...}` to `value`.
    ///
    /// `labels` are positional and must match the family's label names.
    fn set_gauge(&self, name: &str, labels: &[&str], value: f64);

    /// Remove every label combination of the family `name`.
    ///
    /// Infallible: a family that does not exist is simply left alone.
    fn reset_family(&self, name: &str);
}

type SeriesKey = (String, Vec<String>);

/// Lock-sharded in-memory gauge store.
#[derive(Debug, Default)]
pub struct MemorySink {
    series: DashMap<SeriesKey, f64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name{labels...}`, if set.
    pub fn get(&self, name: &str, labels: &[&str]) -> Option<f64> {
        let key: SeriesKey = (name.to_owned(), labels.iter().map(|l| (*l).to_owned()).collect());
        self.series.get(&key).map(|v| *v)
    }

    /// All label tuples and values of one family, sorted by labels.
    pub fn family(&self, name: &str) -> Vec<(Vec<String>, f64)> {
        let mut rows: Vec<_> = self
            .series
            .iter()
            .filter(|entry| entry.key().0 == name)
            .map(|entry| (entry.key().1.clone(), *entry.value()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Total number of series across all families.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl MetricSink for MemorySink {
    fn set_gauge(&self, name: &str, labels: &[&str], value: f64) {
        let labels = labels.iter().map(|l| (*l).to_owned()).collect();
        self.series.insert((name.to_owned(), labels), value);
    }

    fn reset_family(&self, name: &str) {
        self.series.retain(|(family, _), _| family != name);
    }
}
