//! Threshold evaluation, cooldown gating, and alert lifecycle.

use crate::metrics::{MetricName, MetricsCollector};
use crate::rules::{default_rules, AlertRule, Severity};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use spintrack_store::DurableStorage;
use spintrack_utils::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

const RULES_STORAGE_KEY: &str = "spintrack-alert-rules";
const ALERTS_STORAGE_KEY: &str = "spintrack-alerts";

/// History entries kept when persisting alert state.
const PERSISTED_HISTORY_LIMIT: usize = 1000;

/// A fired rule. Stays active until its metric stops breaching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique per firing.
    pub id: String,
    pub rule_id: String,
    pub metric: MetricName,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    pub fired_at_ms: i64,
    pub acknowledged: bool,
    pub resolved_at_ms: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedAlerts {
    active: Vec<Alert>,
    history: Vec<Alert>,
    last_fired: Vec<(String, i64)>,
}

/// Evaluates the rule set against the collector's latest values.
pub struct AlertEngine {
    collector: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn DurableStorage>,
    rules: RwLock<Vec<AlertRule>>,
    /// Active alert per rule id.
    active: DashMap<String, Alert>,
    /// Append-only; resolved and acknowledged flags are updated in place.
    history: Mutex<Vec<Alert>>,
    last_fired: DashMap<String, i64>,
    notifications: broadcast::Sender<Alert>,
}

impl AlertEngine {
    /// Rules and alert state persisted in `storage` take precedence over
    /// the shipped set / an empty history.
    pub fn new(
        collector: Arc<MetricsCollector>,
        clock: Arc<dyn Clock>,
        storage: Arc<dyn DurableStorage>,
    ) -> Self {
        let rules = Self::load_rules(&*storage).unwrap_or_else(default_rules);
        let persisted = Self::load_alerts(&*storage).unwrap_or_default();
        let (notifications, _) = broadcast::channel(64);
        let active = DashMap::new();
        for alert in persisted.active {
            active.insert(alert.rule_id.clone(), alert);
        }
        let last_fired = DashMap::new();
        for (rule_id, at) in persisted.last_fired {
            last_fired.insert(rule_id, at);
        }
        Self {
            collector,
            clock,
            storage,
            rules: RwLock::new(rules),
            active,
            history: Mutex::new(persisted.history),
            last_fired,
            notifications,
        }
    }

    fn load_rules(storage: &dyn DurableStorage) -> Option<Vec<AlertRule>> {
        let raw = storage.get(RULES_STORAGE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(rules) => Some(rules),
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted alert rules");
                None
            }
        }
    }

    fn persist_rules(&self) {
        let rules = self.rules.read();
        match serde_json::to_string(&*rules) {
            Ok(serialized) => {
                if let Err(e) = self.storage.set(RULES_STORAGE_KEY, &serialized) {
                    warn!(error = %e, "persisting alert rules failed");
                }
            }
            Err(e) => warn!(error = %e, "encoding alert rules failed"),
        }
    }

    fn load_alerts(storage: &dyn DurableStorage) -> Option<PersistedAlerts> {
        let raw = storage.get(ALERTS_STORAGE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, "discarding unreadable persisted alert state");
                None
            }
        }
    }

    fn persist_alerts(&self) {
        let history = self.history.lock();
        let start = history.len().saturating_sub(PERSISTED_HISTORY_LIMIT);
        let state = PersistedAlerts {
            active: self.active.iter().map(|e| e.value().clone()).collect(),
            history: history[start..].to_vec(),
            last_fired: self
                .last_fired
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        };
        drop(history);
        match serde_json::to_string(&state) {
            Ok(serialized) => {
                if let Err(e) = self.storage.set(ALERTS_STORAGE_KEY, &serialized) {
                    warn!(error = %e, "persisting alert state failed");
                }
            }
            Err(e) => warn!(error = %e, "encoding alert state failed"),
        }
    }

    /// Drop all alert state, everywhere.
    pub fn clear_alert_data(&self) {
        self.active.clear();
        self.history.lock().clear();
        self.last_fired.clear();
        self.storage.remove(ALERTS_STORAGE_KEY);
    }

    /// Evaluate every enabled rule once.
    ///
    /// A breaching rule fires unless it fired within its cooldown; a rule
    /// that stops breaching resolves its active alert. Firing replaces the
    /// rule's previous active alert.
    pub fn evaluate(&self) {
        let now = self.clock.now_ms();
        let rules = self.rules.read().clone();
        for rule in rules.iter().filter(|r| r.enabled) {
            let Some(value) = self.collector.latest(rule.metric) else {
                continue;
            };
            if rule.comparison.matches(value, rule.threshold) {
                self.fire(rule, value, now);
            } else if let Some((_, alert)) = self.active.remove(&rule.id) {
                self.resolve(alert, now);
            }
        }
    }

    fn fire(&self, rule: &AlertRule, value: f64, now: i64) {
        if let Some(last) = self.last_fired.get(&rule.id) {
            if now - *last < rule.cooldown_ms {
                return;
            }
        }
        let alert = Alert {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            metric: rule.metric,
            value,
            threshold: rule.threshold,
            severity: rule.severity,
            message: format!("{}: {} = {value} (threshold {})", rule.name, rule.metric, rule.threshold),
            fired_at_ms: now,
            acknowledged: false,
            resolved_at_ms: None,
        };
        info!(rule = %rule.id, value, "alert fired");
        self.last_fired.insert(rule.id.clone(), now);
        self.active.insert(rule.id.clone(), alert.clone());
        self.history.lock().push(alert.clone());
        self.persist_alerts();
        // No receivers is fine.
        let _ = self.notifications.send(alert);
    }

    fn resolve(&self, alert: Alert, now: i64) {
        info!(rule = %alert.rule_id, "alert resolved");
        let mut history = self.history.lock();
        if let Some(entry) = history.iter_mut().find(|a| a.id == alert.id) {
            entry.resolved_at_ms = Some(now);
        }
        drop(history);
        self.persist_alerts();
    }

    /// Mark an active alert as seen. Returns false for unknown ids.
    pub fn acknowledge(&self, alert_id: &str) -> bool {
        let mut found = false;
        for mut entry in self.active.iter_mut() {
            if entry.id == alert_id {
                entry.acknowledged = true;
                found = true;
            }
        }
        if found {
            {
                let mut history = self.history.lock();
                if let Some(entry) = history.iter_mut().find(|a| a.id == alert_id) {
                    entry.acknowledged = true;
                }
            }
            self.persist_alerts();
        }
        found
    }

    /// Active alerts, most severe first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.active.iter().map(|e| e.value().clone()).collect();
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.fired_at_ms.cmp(&b.fired_at_ms)));
        alerts
    }

    pub fn history(&self) -> Vec<Alert> {
        self.history.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.notifications.subscribe()
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.read().clone()
    }

    /// Add or replace a rule by id.
    pub fn upsert_rule(&self, rule: AlertRule) {
        {
            let mut rules = self.rules.write();
            match rules.iter_mut().find(|r| r.id == rule.id) {
                Some(existing) => *existing = rule,
                None => rules.push(rule),
            }
        }
        self.persist_rules();
    }

    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let removed = {
            let mut rules = self.rules.write();
            let before = rules.len();
            rules.retain(|r| r.id != rule_id);
            rules.len() != before
        };
        if removed {
            self.active.remove(rule_id);
            self.persist_rules();
        }
        removed
    }

    pub fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> bool {
        let changed = {
            let mut rules = self.rules.write();
            match rules.iter_mut().find(|r| r.id == rule_id) {
                Some(rule) => {
                    rule.enabled = enabled;
                    true
                }
                None => false,
            }
        };
        if changed {
            if !enabled {
                self.active.remove(rule_id);
            }
            self.persist_rules();
        }
        changed
    }

    /// Evaluate on an interval until aborted.
    pub fn spawn_evaluator(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.evaluate();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsConfig, MetricsSink, MetricSample};
    use crate::rules::Comparison;
    use spintrack_store::MemoryStorage;
    use spintrack_utils::ManualClock;

    struct NullSink;

    impl MetricsSink for NullSink {
        fn export(&self, _batch: &[MetricSample]) {}
    }

    fn engine() -> (AlertEngine, Arc<MetricsCollector>, Arc<ManualClock>, Arc<MemoryStorage>) {
        let clock = ManualClock::new(1_000_000);
        let collector = Arc::new(MetricsCollector::new(
            clock.clone(),
            Arc::new(NullSink),
            MetricsConfig::default(),
        ));
        let storage = Arc::new(MemoryStorage::new());
        let engine = AlertEngine::new(collector.clone(), clock.clone(), storage.clone());
        (engine, collector, clock, storage)
    }

    #[test]
    fn breach_fires_once_per_cooldown() {
        let (engine, collector, clock, _storage) = engine();
        let mut notifications = engine.subscribe();

        collector.record(MetricName::Lcp, 5_000.0);
        engine.evaluate();
        assert_eq!(engine.active_alerts().len(), 2); // critical + degraded
        let first = notifications.try_recv().unwrap();
        assert_eq!(first.rule_id, "lcp-critical");

        // Still breaching inside the cooldown: suppressed.
        collector.record(MetricName::Lcp, 6_000.0);
        engine.evaluate();
        assert_eq!(engine.history().len(), 2);

        // Past the 5min cooldown the critical rule fires again with a fresh
        // id; the degraded rule's 10min cooldown still holds it back.
        clock.advance(5 * 60 * 1000 + 1);
        engine.evaluate();
        let history = engine.history();
        assert_eq!(history.len(), 3);
        assert_ne!(history[0].id, history[2].id);
        assert_eq!(history[2].rule_id, "lcp-critical");

        clock.advance(5 * 60 * 1000);
        engine.evaluate();
        assert_eq!(engine.history().len(), 5);
    }

    #[test]
    fn recovery_resolves_the_active_alert() {
        let (engine, collector, _clock, _storage) = engine();

        collector.record(MetricName::ErrorRate, 25.0);
        engine.evaluate();
        assert_eq!(engine.active_alerts().len(), 1);

        collector.record(MetricName::ErrorRate, 2.0);
        engine.evaluate();
        assert!(engine.active_alerts().is_empty());
        let history = engine.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].resolved_at_ms.is_some());
    }

    #[test]
    fn low_cache_hit_rate_uses_less_than() {
        let (engine, collector, _clock, _storage) = engine();
        collector.record(MetricName::CacheHitRate, 80.0);
        engine.evaluate();
        assert!(engine.active_alerts().is_empty());

        collector.record(MetricName::CacheHitRate, 40.0);
        engine.evaluate();
        assert_eq!(engine.active_alerts()[0].rule_id, "cache-hit-rate-low");
    }

    #[test]
    fn acknowledge_marks_active_and_history() {
        let (engine, collector, _clock, _storage) = engine();
        collector.record(MetricName::DashboardLoadTime, 9_000.0);
        engine.evaluate();
        let alert = engine.active_alerts().remove(0);

        assert!(engine.acknowledge(&alert.id));
        assert!(engine.active_alerts()[0].acknowledged);
        assert!(engine.history()[0].acknowledged);
        assert!(!engine.acknowledge("nope"));
    }

    #[test]
    fn disabled_rules_do_not_fire() {
        let (engine, collector, _clock, _storage) = engine();
        assert!(engine.set_rule_enabled("lcp-degraded", false));
        assert!(engine.set_rule_enabled("lcp-critical", false));

        collector.record(MetricName::Lcp, 5_000.0);
        engine.evaluate();
        assert!(engine.active_alerts().is_empty());
    }

    #[test]
    fn custom_rules_survive_a_restart() {
        let (engine, collector, clock, storage) = engine();
        engine.upsert_rule(AlertRule {
            id: "ttfb-slow".into(),
            name: "TTFB slow".into(),
            metric: MetricName::Ttfb,
            comparison: Comparison::GreaterThan,
            threshold: 800.0,
            severity: Severity::Low,
            enabled: true,
            cooldown_ms: 60_000,
            description: "Server first byte over budget".into(),
        });

        let reopened = AlertEngine::new(collector.clone(), clock, storage);
        assert!(reopened.rules().iter().any(|r| r.id == "ttfb-slow"));

        collector.record(MetricName::Ttfb, 900.0);
        reopened.evaluate();
        assert_eq!(reopened.active_alerts()[0].rule_id, "ttfb-slow");
    }

    #[test]
    fn alert_state_survives_a_restart() {
        let (engine, collector, clock, storage) = engine();
        collector.record(MetricName::Cls, 0.3);
        engine.evaluate();
        assert_eq!(engine.active_alerts().len(), 2);

        let reopened = AlertEngine::new(collector.clone(), clock.clone(), storage.clone());
        assert_eq!(reopened.active_alerts().len(), 2);
        assert_eq!(reopened.history().len(), 2);

        // Reloaded cooldown stamps still gate firing.
        reopened.evaluate();
        assert_eq!(reopened.history().len(), 2);

        reopened.clear_alert_data();
        let cleared = AlertEngine::new(collector, clock, storage);
        assert!(cleared.active_alerts().is_empty());
        assert!(cleared.history().is_empty());
    }

    #[test]
    fn removed_rule_clears_its_active_alert() {
        let (engine, collector, _clock, _storage) = engine();
        collector.record(MetricName::ApiResponseTime, 3_000.0);
        engine.evaluate();
        assert_eq!(engine.active_alerts().len(), 1);

        assert!(engine.remove_rule("api-slow"));
        assert!(engine.active_alerts().is_empty());
        assert!(!engine.remove_rule("api-slow"));
    }
}
