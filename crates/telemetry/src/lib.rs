//! Performance telemetry for spintrack.
//!
//! Collects UX and cache metrics into batched exports and evaluates a
//! persistable rule set over the latest values, with cooldown-gated alert
//! notifications.

pub mod alerts;
pub mod metrics;
pub mod rules;

pub use alerts::{Alert, AlertEngine};
pub use metrics::{MetricName, MetricSample, MetricsCollector, MetricsConfig, MetricsSink};
pub use rules::{default_rules, AlertRule, Comparison, Severity};
