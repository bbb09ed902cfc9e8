//! Alert rule definitions and the shipped rule set.

use crate::metrics::MetricName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    LessThan,
    Equals,
}

impl Comparison {
    #[must_use]
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
            Comparison::Equals => (value - threshold).abs() < 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub metric: MetricName,
    pub comparison: Comparison,
    pub threshold: f64,
    pub severity: Severity,
    pub enabled: bool,
    /// Minimum quiet period between firings of this rule.
    pub cooldown_ms: i64,
    pub description: String,
}

pub const DEFAULT_COOLDOWN_MS: i64 = 5 * 60 * 1000;

#[allow(clippy::too_many_arguments)]
fn rule(
    id: &str,
    name: &str,
    metric: MetricName,
    comparison: Comparison,
    threshold: f64,
    severity: Severity,
    cooldown_minutes: i64,
    description: &str,
) -> AlertRule {
    AlertRule {
        id: id.to_owned(),
        name: name.to_owned(),
        metric,
        comparison,
        threshold,
        severity,
        enabled: true,
        cooldown_ms: cooldown_minutes * 60 * 1000,
        description: description.to_owned(),
    }
}

/// The shipped rule set. Thresholds follow the web-vital "poor" and
/// "needs improvement" bands, plus in-house limits for dashboard, API, and
/// cache behavior.
#[must_use]
pub fn default_rules() -> Vec<AlertRule> {
    use Comparison::{GreaterThan, LessThan};
    use MetricName::*;
    use Severity::{Critical, High, Medium};

    vec![
        rule(
            "lcp-critical",
            "LCP critical",
            Lcp,
            GreaterThan,
            4000.0,
            Critical,
            5,
            "Largest contentful paint above the poor band",
        ),
        rule(
            "lcp-degraded",
            "LCP degraded",
            Lcp,
            GreaterThan,
            2500.0,
            Medium,
            10,
            "Largest contentful paint needs improvement",
        ),
        rule(
            "fid-critical",
            "FID critical",
            Fid,
            GreaterThan,
            300.0,
            Critical,
            5,
            "First input delay above the poor band",
        ),
        rule(
            "fid-degraded",
            "FID degraded",
            Fid,
            GreaterThan,
            100.0,
            Medium,
            10,
            "First input delay needs improvement",
        ),
        rule(
            "cls-critical",
            "CLS critical",
            Cls,
            GreaterThan,
            0.25,
            Critical,
            5,
            "Cumulative layout shift above the poor band",
        ),
        rule(
            "cls-degraded",
            "CLS degraded",
            Cls,
            GreaterThan,
            0.1,
            Medium,
            10,
            "Cumulative layout shift needs improvement",
        ),
        rule(
            "dashboard-slow",
            "Dashboard slow",
            DashboardLoadTime,
            GreaterThan,
            5000.0,
            High,
            5,
            "Dashboard took too long to become interactive",
        ),
        rule(
            "api-slow",
            "API slow",
            ApiResponseTime,
            GreaterThan,
            2000.0,
            Medium,
            10,
            "API responses slower than the budget",
        ),
        rule(
            "cache-hit-rate-low",
            "Cache hit rate low",
            CacheHitRate,
            LessThan,
            50.0,
            Medium,
            15,
            "More than half of reads missing the cache",
        ),
        rule(
            "error-rate-high",
            "Error rate high",
            ErrorRate,
            GreaterThan,
            10.0,
            High,
            5,
            "Request error rate above tolerance",
        ),
    ]
}
