//! Metric recording and batched export.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use spintrack_utils::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Closed set of tracked metrics. Web-vital style UX timings plus the
/// cache's own rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricName {
    Lcp,
    Fid,
    Cls,
    Ttfb,
    DashboardLoadTime,
    ApiResponseTime,
    CacheHitRate,
    ErrorRate,
}

impl MetricName {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Lcp => "lcp",
            MetricName::Fid => "fid",
            MetricName::Cls => "cls",
            MetricName::Ttfb => "ttfb",
            MetricName::DashboardLoadTime => "dashboard-load-time",
            MetricName::ApiResponseTime => "api-response-time",
            MetricName::CacheHitRate => "cache-hit-rate",
            MetricName::ErrorRate => "error-rate",
        }
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: MetricName,
    pub value: f64,
    pub recorded_at_ms: i64,
}

/// Where flushed batches go: an analytics endpoint, a log exporter, a test
/// buffer.
pub trait MetricsSink: Send + Sync {
    fn export(&self, batch: &[MetricSample]);
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Buffer flushes when it reaches this many samples.
    pub flush_threshold: usize,
    /// And at least this often regardless of volume.
    pub flush_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 50,
            flush_interval: Duration::from_secs(30),
        }
    }
}

/// Buffers samples for batched export and keeps the latest value per metric
/// for threshold evaluation.
pub struct MetricsCollector {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn MetricsSink>,
    config: MetricsConfig,
    latest: DashMap<MetricName, f64>,
    buffer: Mutex<Vec<MetricSample>>,
}

impl MetricsCollector {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn MetricsSink>, config: MetricsConfig) -> Self {
        Self {
            clock,
            sink,
            config,
            latest: DashMap::new(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, metric: MetricName, value: f64) {
        self.latest.insert(metric, value);
        let flush_now = {
            let mut buffer = self.buffer.lock();
            buffer.push(MetricSample {
                metric,
                value,
                recorded_at_ms: self.clock.now_ms(),
            });
            buffer.len() >= self.config.flush_threshold
        };
        if flush_now {
            self.flush();
        }
    }

    /// Export and clear the buffer. A no-op when empty.
    pub fn flush(&self) {
        let batch: Vec<MetricSample> = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "flushing metric batch");
        self.sink.export(&batch);
    }

    /// Latest recorded value for the metric, if any.
    pub fn latest(&self, metric: MetricName) -> Option<f64> {
        self.latest.get(&metric).map(|v| *v)
    }

    pub fn snapshot(&self) -> HashMap<MetricName, f64> {
        self.latest.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Flush on the configured interval until aborted.
    pub fn spawn_flusher(self: &Arc<Self>) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(collector.config.flush_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                collector.flush();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spintrack_utils::ManualClock;

    #[derive(Default)]
    struct BufferSink {
        batches: Mutex<Vec<Vec<MetricSample>>>,
    }

    impl MetricsSink for BufferSink {
        fn export(&self, batch: &[MetricSample]) {
            self.batches.lock().push(batch.to_vec());
        }
    }

    fn collector(threshold: usize) -> (Arc<MetricsCollector>, Arc<BufferSink>) {
        let sink = Arc::new(BufferSink::default());
        let collector = Arc::new(MetricsCollector::new(
            ManualClock::new(0),
            sink.clone(),
            MetricsConfig {
                flush_threshold: threshold,
                ..MetricsConfig::default()
            },
        ));
        (collector, sink)
    }

    #[test]
    fn buffer_flushes_at_the_threshold() {
        let (collector, sink) = collector(3);
        collector.record(MetricName::Lcp, 1200.0);
        collector.record(MetricName::Fid, 40.0);
        assert!(sink.batches.lock().is_empty());

        collector.record(MetricName::Cls, 0.02);
        let batches = sink.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(collector.buffered(), 0);
    }

    #[test]
    fn latest_value_wins() {
        let (collector, _sink) = collector(100);
        collector.record(MetricName::Lcp, 1200.0);
        collector.record(MetricName::Lcp, 3000.0);
        assert_eq!(collector.latest(MetricName::Lcp), Some(3000.0));
        assert_eq!(collector.latest(MetricName::ErrorRate), None);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_flushes_a_partial_buffer() {
        let (collector, sink) = collector(100);
        let handle = collector.spawn_flusher();
        tokio::task::yield_now().await;

        collector.record(MetricName::ApiResponseTime, 250.0);
        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::task::yield_now().await;

        assert_eq!(sink.batches.lock().len(), 1);
        assert_eq!(collector.buffered(), 0);
        handle.abort();
    }
}
