//! Dependency-cascade invalidation over a static family graph.

use super::InvalidationService;
use spintrack_core::QueryKey;
use tracing::{debug, warn};

/// Closed set of resource families the cascade graph is defined over.
///
/// A family is identified by the leading segments of its keys; membership is
/// structural prefix comparison, never substring matching on a serialized
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFamily {
    UserPreferences,
    UserProfile,
    Dashboard,
    DashboardEssential,
    DashboardSecondary,
    Realtime,
    Admin,
    StaticData,
}

impl ResourceFamily {
    /// The key prefix identifying this family. User-scoped families append
    /// the user id as their final segment.
    #[must_use]
    pub fn prefix(&self, user_id: Option<&str>) -> QueryKey {
        let base = match self {
            ResourceFamily::UserPreferences => QueryKey::of(["user", "preferences"]),
            ResourceFamily::UserProfile => QueryKey::of(["user", "profile"]),
            ResourceFamily::Dashboard => QueryKey::of(["dashboard"]),
            ResourceFamily::DashboardEssential => QueryKey::of(["dashboard", "essential"]),
            ResourceFamily::DashboardSecondary => QueryKey::of(["dashboard", "secondary"]),
            ResourceFamily::Realtime => QueryKey::of(["realtime"]),
            ResourceFamily::Admin => QueryKey::of(["admin"]),
            ResourceFamily::StaticData => QueryKey::of(["static"]),
        };
        match (self.is_user_scoped(), user_id) {
            (true, Some(user)) => base.join(user),
            _ => base,
        }
    }

    const fn is_user_scoped(&self) -> bool {
        matches!(
            self,
            ResourceFamily::UserPreferences | ResourceFamily::UserProfile
        )
    }

    /// Classify a trigger key into the most specific family it belongs to.
    #[must_use]
    pub fn classify(key: &QueryKey) -> Option<Self> {
        // Most specific prefixes first
        const ORDERED: [ResourceFamily; 8] = [
            ResourceFamily::UserPreferences,
            ResourceFamily::UserProfile,
            ResourceFamily::DashboardEssential,
            ResourceFamily::DashboardSecondary,
            ResourceFamily::Dashboard,
            ResourceFamily::Realtime,
            ResourceFamily::Admin,
            ResourceFamily::StaticData,
        ];
        ORDERED
            .into_iter()
            .find(|family| key.starts_with(&family.prefix(None)))
    }

    /// Static adjacency: the families invalidated when this one changes.
    #[must_use]
    pub fn dependents(&self) -> &'static [ResourceFamily] {
        match self {
            ResourceFamily::UserPreferences => &[
                ResourceFamily::UserPreferences,
                ResourceFamily::DashboardEssential,
                ResourceFamily::DashboardSecondary,
            ],
            ResourceFamily::UserProfile => &[
                ResourceFamily::UserProfile,
                ResourceFamily::DashboardEssential,
            ],
            ResourceFamily::Dashboard
            | ResourceFamily::DashboardEssential
            | ResourceFamily::DashboardSecondary => &[ResourceFamily::Dashboard],
            ResourceFamily::Realtime => {
                &[ResourceFamily::Realtime, ResourceFamily::DashboardSecondary]
            }
            ResourceFamily::Admin => &[ResourceFamily::Admin],
            ResourceFamily::StaticData => &[ResourceFamily::StaticData],
        }
    }
}

/// How far a cascade reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeScope {
    /// Only the trigger key itself.
    Local,
    /// The cascade set restricted to keys carrying the user's id segment.
    User,
    /// The full cascade set.
    Global,
}

impl InvalidationService {
    /// Invalidate the dependents of `trigger` per the static family graph.
    ///
    /// `CascadeScope::User` requires `user_id`; cascade keys that do not
    /// carry the user id as a whole segment are left untouched.
    pub async fn cascade_invalidate(
        &self,
        trigger: &QueryKey,
        user_id: Option<&str>,
        scope: CascadeScope,
    ) {
        if scope == CascadeScope::Local {
            if let Err(e) = self.store.invalidate(trigger).await {
                warn!(key = %trigger, error = %e, "local cascade invalidation failed");
            }
            return;
        }

        let Some(family) = ResourceFamily::classify(trigger) else {
            debug!(key = %trigger, "trigger key matches no cascade family");
            if let Err(e) = self.store.invalidate(trigger).await {
                warn!(key = %trigger, error = %e, "trigger invalidation failed");
            }
            return;
        };

        debug!(key = %trigger, ?family, ?scope, "cascade invalidation triggered");

        let prefixes: Vec<QueryKey> = family
            .dependents()
            .iter()
            .map(|dep| dep.prefix(user_id))
            .collect();

        let targets: Vec<QueryKey> = match scope {
            CascadeScope::User => {
                let Some(user) = user_id else {
                    warn!(key = %trigger, "user-scoped cascade without a user id");
                    return;
                };
                self.store
                    .entries()
                    .into_iter()
                    .map(|e| e.key)
                    .filter(|k| prefixes.iter().any(|p| k.starts_with(p)))
                    .filter(|k| k.contains_segment(user))
                    .collect()
            }
            CascadeScope::Global => self
                .store
                .entries()
                .into_iter()
                .map(|e| e.key)
                .filter(|k| prefixes.iter().any(|p| k.starts_with(p)))
                .collect(),
            CascadeScope::Local => unreachable!(),
        };

        self.batch_invalidate(&targets);
    }
}
