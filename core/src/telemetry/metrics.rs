use std::sync::Mutex;

/// Counters over one analysis session. The parse counter is the hook used
/// to verify that cached batches are not read twice.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub parsed: usize,
    pub skipped: usize,
    pub aggregations: usize,
}

#[derive(Default)]
struct Metrics {
    parsed: usize,
    skipped: usize,
    aggregations: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_parsed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.parsed += 1;
        }
    }

    pub fn record_skipped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.skipped += 1;
        }
    }

    pub fn record_aggregation(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.aggregations += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                parsed: metrics.parsed,
                skipped: metrics.skipped,
                aggregations: metrics.aggregations,
            }
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
