use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Type of metric.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// Point-in-time reading of one series, for hosts that want to log or ship it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: String,
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub metric_type: MetricType,
    /// Counter/gauge value; histograms report their p50.
    pub value: f64,
}

/// Summary statistics from a histogram.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct MetricKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }
}

enum Series {
    Counter(AtomicU64),
    /// f64 stored as raw bits.
    Gauge(AtomicU64),
    Histogram(Mutex<Vec<f64>>),
}

impl Series {
    fn metric_type(&self) -> MetricType {
        match self {
            Self::Counter(_) => MetricType::Counter,
            Self::Gauge(_) => MetricType::Gauge,
            Self::Histogram(_) => MetricType::Histogram,
        }
    }

    fn value(&self) -> f64 {
        match self {
            Self::Counter(c) => c.load(Ordering::Relaxed) as f64,
            Self::Gauge(g) => f64::from_bits(g.load(Ordering::Relaxed)),
            Self::Histogram(h) => summarize(&h.lock()).p50,
        }
    }
}

fn summarize(observations: &[f64]) -> HistogramSummary {
    if observations.is_empty() {
        return HistogramSummary::default();
    }
    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = sorted.len();
    let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];
    HistogramSummary {
        count: count as u64,
        sum: sorted.iter().sum(),
        min: sorted[0],
        max: sorted[count - 1],
        p50: at(0.5),
        p95: at(0.95),
        p99: at(0.99),
    }
}

/// Thread-safe in-memory metrics recorder.
///
/// A series is created on first write. Writing a name with a different metric
/// type than it was created with is ignored.
#[derive(Default)]
pub struct MetricsRecorder {
    series: RwLock<HashMap<MetricKey, Series>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_series(&self, name: &str, labels: &[(&str, &str)], make: fn() -> Series, apply: impl Fn(&Series)) {
        let key = MetricKey::new(name, labels);
        {
            let series = self.series.read();
            if let Some(s) = series.get(&key) {
                apply(s);
                return;
            }
        }
        let mut series = self.series.write();
        apply(series.entry(key).or_insert_with(make));
    }

    /// Increment a counter by n.
    pub fn counter_inc(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        self.with_series(
            name,
            labels,
            || Series::Counter(AtomicU64::new(0)),
            |s| {
                if let Series::Counter(c) = s {
                    c.fetch_add(n, Ordering::Relaxed);
                }
            },
        );
    }

    /// Set a gauge to a specific value.
    pub fn gauge_set(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.with_series(
            name,
            labels,
            || Series::Gauge(AtomicU64::new(0f64.to_bits())),
            |s| {
                if let Series::Gauge(g) = s {
                    g.store(value.to_bits(), Ordering::Relaxed);
                }
            },
        );
    }

    /// Record a histogram observation.
    pub fn histogram_observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.with_series(
            name,
            labels,
            || Series::Histogram(Mutex::new(Vec::new())),
            |s| {
                if let Series::Histogram(h) = s {
                    h.lock().push(value);
                }
            },
        );
    }

    pub fn counter_get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        match self.series.read().get(&MetricKey::new(name, labels)) {
            Some(Series::Counter(c)) => c.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    pub fn gauge_get(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        match self.series.read().get(&MetricKey::new(name, labels)) {
            Some(Series::Gauge(g)) => f64::from_bits(g.load(Ordering::Relaxed)),
            _ => 0.0,
        }
    }

    pub fn histogram_summary(&self, name: &str, labels: &[(&str, &str)]) -> HistogramSummary {
        match self.series.read().get(&MetricKey::new(name, labels)) {
            Some(Series::Histogram(h)) => summarize(&h.lock()),
            _ => HistogramSummary::default(),
        }
    }

    /// Read every series, sorted by name.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        let now = Utc::now().to_rfc3339();
        let mut samples: Vec<MetricSample> = self
            .series
            .read()
            .iter()
            .map(|(key, series)| MetricSample {
                timestamp: now.clone(),
                name: key.name.clone(),
                labels: key.labels.clone(),
                metric_type: series.metric_type(),
                value: series.value(),
            })
            .collect();
        samples.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counter_basic() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("channel.queue.evicted", &[], 1);
        recorder.counter_inc("channel.queue.evicted", &[], 2);
        assert_eq!(recorder.counter_get("channel.queue.evicted", &[]), 3);
        assert_eq!(recorder.counter_get("missing", &[]), 0);
    }

    #[test]
    fn gauge_overwrites() {
        let recorder = MetricsRecorder::new();
        recorder.gauge_set("channel.queue.depth", &[], 4.0);
        recorder.gauge_set("channel.queue.depth", &[], 1.0);
        assert!((recorder.gauge_get("channel.queue.depth", &[]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn histogram_summary_percentiles() {
        let recorder = MetricsRecorder::new();
        for v in 1..=100 {
            recorder.histogram_observe("delay_ms", &[], v as f64);
        }
        let s = recorder.histogram_summary("delay_ms", &[]);
        assert_eq!(s.count, 100);
        assert!((s.min - 1.0).abs() < f64::EPSILON);
        assert!((s.max - 100.0).abs() < f64::EPSILON);
        assert!((s.p50 - 51.0).abs() < f64::EPSILON);
        assert!((s.p99 - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn histogram_empty() {
        let recorder = MetricsRecorder::new();
        assert_eq!(recorder.histogram_summary("none", &[]).count, 0);
    }

    #[test]
    fn label_ordering_independent() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("frames", &[("dir", "in"), ("kind", "chat")], 1);
        recorder.counter_inc("frames", &[("kind", "chat"), ("dir", "in")], 1);
        assert_eq!(recorder.counter_get("frames", &[("dir", "in"), ("kind", "chat")]), 2);
    }

    #[test]
    fn type_mismatch_is_ignored() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("x", &[], 5);
        recorder.gauge_set("x", &[], 9.0);
        assert_eq!(recorder.counter_get("x", &[]), 5);
        assert!(recorder.gauge_get("x", &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_is_sorted() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("b", &[], 1);
        recorder.gauge_set("a", &[], 2.0);
        let snap = recorder.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].name, "a");
        assert_eq!(snap[0].metric_type, MetricType::Gauge);
        assert_eq!(snap[1].metric_type, MetricType::Counter);
    }

    #[tokio::test]
    async fn concurrent_counter_increments() {
        let recorder = Arc::new(MetricsRecorder::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let r = Arc::clone(&recorder);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    r.counter_inc("turns", &[], 1);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(recorder.counter_get("turns", &[]), 800);
    }
}
