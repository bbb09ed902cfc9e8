//! Priority-aware cache warming.
//!
//! Pre-populates the store around the moments data is about to be needed:
//! login (staged by priority), navigation, inferred usage patterns, time of
//! day, and idle capacity. All passes run through an in-flight registry so
//! the same pass never stacks.

mod behavior;
mod plans;
mod registry;

pub use behavior::{infer_behavior_tags, BehaviorTag, UserProfile};
pub use plans::WarmTarget;
pub use registry::TaskRegistry;

use crate::config::CacheConfig;
use dashmap::DashMap;
use spintrack_store::QueryStore;
use spintrack_utils::Clock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Result of a warming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmingOutcome {
    pub warmed: usize,
    pub failed: usize,
}

/// Lifetime totals plus the current in-flight count.
#[derive(Debug, Clone, Copy)]
pub struct WarmingStats {
    pub total_warmed: u64,
    pub total_failed: u64,
    pub in_flight: usize,
}

/// Signals from the embedder about whether background warming is welcome
/// right now (app foregrounded, user idle, battery not constrained).
pub trait IdlePolicy: Send + Sync {
    fn should_warm(&self) -> bool;
}

/// Inputs to time-of-day predictive warming.
#[derive(Debug, Clone, Copy)]
pub struct PredictiveContext {
    /// Local hour, 0-23.
    pub hour_of_day: u32,
    /// 0 = Sunday ... 6 = Saturday.
    pub day_of_week: u32,
    /// Recent activity level in [0, 1].
    pub activity_level: f64,
    pub is_admin: bool,
}

#[derive(Default)]
struct Counters {
    warmed: AtomicU64,
    failed: AtomicU64,
}

pub struct WarmingService {
    store: Arc<dyn QueryStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    registry: Arc<TaskRegistry>,
    /// Last completed pass per signature, epoch ms. Drives throttling.
    history: DashMap<String, i64>,
    counters: Arc<Counters>,
}

impl WarmingService {
    pub fn new(store: Arc<dyn QueryStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
            registry: Arc::new(TaskRegistry::new()),
            history: DashMap::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Staged warming after sign-in.
    ///
    /// Phase 1 (essential user data) is awaited and its outcome returned;
    /// the later phases run detached so login is never held up by secondary
    /// data: dashboard essentials shortly after, behavior-inferred bundles
    /// at ~2s, static reference data at ~5s. A login pass already in flight
    /// for the user is joined, not restarted.
    pub async fn warm_on_login(
        &self,
        user_id: &str,
        profile: Option<&UserProfile>,
    ) -> WarmingOutcome {
        let signature = format!("login:{user_id}");
        let tags = match profile {
            Some(profile) => infer_behavior_tags(profile),
            None => vec![BehaviorTag::BasicUser],
        };

        let store = self.store.clone();
        let counters = self.counters.clone();
        let user = user_id.to_owned();
        let pass = async move {
            spawn_phase(
                Duration::from_millis(500),
                store.clone(),
                counters.clone(),
                plans::dashboard_essential(),
            );
            spawn_phase(
                Duration::from_secs(2),
                store.clone(),
                counters.clone(),
                tag_targets(&user, &tags),
            );
            spawn_phase(
                Duration::from_secs(5),
                store.clone(),
                counters.clone(),
                plans::static_reference(),
            );
            warm_targets(store, plans::essential(&user), counters).await
        };

        let outcome = self.registry.run_or_join(&signature, pass).await;
        self.history.insert(signature, self.clock.now_ms());
        info!(
            user = user_id,
            warmed = outcome.warmed,
            failed = outcome.failed,
            "login warming phase one complete"
        );
        outcome
    }

    /// Warm the bundles matching the given behavior tags, concurrently and
    /// deduplicated across tags. A pass already in flight for the same user
    /// and tag set is joined, not restarted.
    pub async fn warm_for_tags(&self, user_id: &str, tags: &[BehaviorTag]) -> WarmingOutcome {
        let signature = format!("behavior:{user_id}:{tags:?}");
        let targets = tag_targets(user_id, tags);
        let pass = warm_targets(self.store.clone(), targets, self.counters.clone());
        self.registry.run_or_join(&signature, pass).await
    }

    /// Warm ahead of a route transition. Dashboard routes get their optional
    /// tier after a short delay rather than with the first paint data. A
    /// pass already in flight for the same route and user is joined, not
    /// restarted.
    pub async fn warm_on_navigation(&self, route: &str, user_id: &str) -> WarmingOutcome {
        let signature = format!("navigation:{route}:{user_id}");
        let mut targets;
        let mut deferred = Vec::new();
        if route.starts_with("/dashboard") {
            targets = plans::dashboard_essential();
            targets.extend(plans::dashboard_secondary());
            deferred = plans::dashboard_optional();
        } else if route.starts_with("/admin") {
            targets = plans::admin();
        } else if route.starts_with("/reports") || route.starts_with("/analytics") {
            targets = plans::analytics();
        } else if route.starts_with("/profile") || route.starts_with("/settings") {
            targets = plans::essential(user_id);
        } else {
            targets = plans::essential(user_id);
        }

        let store = self.store.clone();
        let counters = self.counters.clone();
        let pass = async move {
            if !deferred.is_empty() {
                spawn_phase(
                    Duration::from_secs(2),
                    store.clone(),
                    counters.clone(),
                    deferred,
                );
            }
            warm_targets(store, targets, counters).await
        };
        self.registry.run_or_join(&signature, pass).await
    }

    /// Time-of-day and activity driven warming. The rules are independent;
    /// every matching bundle is warmed in one concurrent pass.
    pub async fn warm_predictive(
        &self,
        user_id: &str,
        context: &PredictiveContext,
    ) -> WarmingOutcome {
        let mut targets = Vec::new();
        if (6..=11).contains(&context.hour_of_day) {
            targets.extend(plans::dashboard_essential());
        }
        if (18..=23).contains(&context.hour_of_day) {
            targets.extend(plans::analytics());
        }
        if context.activity_level > 0.7 {
            targets.extend(plans::realtime());
        }
        if context.is_admin && (1..=5).contains(&context.day_of_week) {
            targets.extend(plans::admin());
        }
        if targets.is_empty() {
            debug!(user = user_id, "no predictive warming rule matched");
            return WarmingOutcome::default();
        }
        let targets = dedupe(targets);
        let signature = format!("predictive:{user_id}:{}", context.hour_of_day);
        let pass = warm_targets(self.store.clone(), targets, self.counters.clone());
        self.registry.run_or_join(&signature, pass).await
    }

    /// Re-warm the user's hot set, throttled so a pass at most every
    /// `warming_throttle_ms` per user.
    pub async fn warm_frequently_accessed(&self, user_id: &str) -> WarmingOutcome {
        let history_key = format!("frequent:{user_id}");
        let now = self.clock.now_ms();
        if let Some(last) = self.history.get(&history_key) {
            if now - *last < self.config.warming_throttle_ms {
                debug!(user = user_id, "frequently-accessed warming throttled");
                return WarmingOutcome::default();
            }
        }
        self.history.insert(history_key.clone(), now);

        let mut targets = plans::essential(user_id);
        targets.extend(plans::dashboard_essential());
        let pass = warm_targets(self.store.clone(), targets, self.counters.clone());
        self.registry.run_or_join(&history_key, pass).await
    }

    /// Periodic low-priority warming of static reference data whenever the
    /// policy reports idle capacity. Ticks while `online` reads `false` are
    /// skipped, so offline intervals issue no fetches.
    pub fn spawn_idle_warming(
        self: &Arc<Self>,
        policy: Arc<dyn IdlePolicy>,
        online: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.idle_warming_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !*online.borrow() {
                    debug!("idle warming suspended while offline");
                    continue;
                }
                if !policy.should_warm() {
                    continue;
                }
                let outcome = warm_targets(
                    service.store.clone(),
                    plans::static_reference(),
                    service.counters.clone(),
                )
                .await;
                debug!(warmed = outcome.warmed, "idle warming pass complete");
            }
        })
    }

    pub fn warming_stats(&self) -> WarmingStats {
        WarmingStats {
            total_warmed: self.counters.warmed.load(Ordering::Relaxed),
            total_failed: self.counters.failed.load(Ordering::Relaxed),
            in_flight: self.registry.in_flight(),
        }
    }
}

fn tag_targets(user_id: &str, tags: &[BehaviorTag]) -> Vec<WarmTarget> {
    dedupe(
        tags.iter()
            .flat_map(|tag| tag.targets(user_id))
            .collect::<Vec<_>>(),
    )
}

fn dedupe(targets: Vec<WarmTarget>) -> Vec<WarmTarget> {
    let mut seen: HashSet<String> = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.key.canonical()))
        .collect()
}

fn spawn_phase(
    delay: Duration,
    store: Arc<dyn QueryStore>,
    counters: Arc<Counters>,
    targets: Vec<WarmTarget>,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let outcome = warm_targets(store, targets, counters).await;
        debug!(
            warmed = outcome.warmed,
            failed = outcome.failed,
            delay_ms = delay.as_millis() as u64,
            "staged warming phase complete"
        );
    });
}

async fn warm_targets(
    store: Arc<dyn QueryStore>,
    targets: Vec<WarmTarget>,
    counters: Arc<Counters>,
) -> WarmingOutcome {
    let results = futures::future::join_all(targets.into_iter().map(|target| {
        let store = store.clone();
        async move {
            match store.prefetch(&target.key, target.stale_time_ms).await {
                Ok(()) => true,
                Err(e) => {
                    debug!(key = %target.key, error = %e, "warming prefetch failed");
                    false
                }
            }
        }
    }))
    .await;

    let warmed = results.iter().filter(|ok| **ok).count();
    let failed = results.len() - warmed;
    counters.warmed.fetch_add(warmed as u64, Ordering::Relaxed);
    counters.failed.fetch_add(failed as u64, Ordering::Relaxed);
    WarmingOutcome { warmed, failed }
}
