//! Mutation-mapped invalidation with refresh strategies.

use super::cascade::ResourceFamily;
use super::InvalidationService;
use spintrack_core::QueryKey;
use tracing::{debug, warn};

/// Closed set of mutations the UI layer can report. Exhaustively matched to
/// the key families they dirty; an unknown mutation cannot silently no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    UserPreferencesUpdate,
    UserProfileUpdate,
    DashboardDataUpdate,
    RealtimeDataUpdate,
    AdminDataUpdate,
    StaticDataUpdate,
}

impl MutationKind {
    /// Key families dirtied by this mutation.
    #[must_use]
    pub fn dirtied_families(&self) -> &'static [ResourceFamily] {
        match self {
            MutationKind::UserPreferencesUpdate => &[
                ResourceFamily::UserPreferences,
                ResourceFamily::DashboardEssential,
                ResourceFamily::DashboardSecondary,
            ],
            MutationKind::UserProfileUpdate => &[
                ResourceFamily::UserProfile,
                ResourceFamily::DashboardEssential,
            ],
            MutationKind::DashboardDataUpdate => &[ResourceFamily::Dashboard],
            MutationKind::RealtimeDataUpdate => &[
                ResourceFamily::Realtime,
                ResourceFamily::DashboardSecondary,
            ],
            MutationKind::AdminDataUpdate => &[ResourceFamily::Admin],
            MutationKind::StaticDataUpdate => &[ResourceFamily::StaticData],
        }
    }
}

/// When the invalidated families are refetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Refetch now.
    Immediate,
    /// Invalidate now, refetch after a short delay.
    Background,
    /// Invalidate only; consumers refetch on demand.
    Lazy,
}

impl InvalidationService {
    /// Invalidate the families dirtied by `mutation` and refresh them per
    /// `strategy`. Best-effort: fetch failures are logged, never returned.
    pub async fn invalidate_by_mutation(
        &self,
        mutation: MutationKind,
        user_id: Option<&str>,
        strategy: RefreshStrategy,
    ) {
        debug!(?mutation, ?strategy, "mutation-based invalidation");

        let prefixes: Vec<QueryKey> = mutation
            .dirtied_families()
            .iter()
            .map(|family| family.prefix(user_id))
            .collect();

        for prefix in &prefixes {
            if let Err(e) = self.store.invalidate_prefix(prefix).await {
                warn!(prefix = %prefix, error = %e, "mutation invalidation failed");
            }
        }

        match strategy {
            RefreshStrategy::Lazy => {}
            RefreshStrategy::Immediate => {
                self.refetch_families(&prefixes).await;
            }
            RefreshStrategy::Background => {
                let store = self.store.clone();
                let delay = self.config.background_refetch_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for prefix in &prefixes {
                        let targets: Vec<QueryKey> = store
                            .entries()
                            .into_iter()
                            .map(|e| e.key)
                            .filter(|k| k.starts_with(prefix))
                            .collect();
                        for key in targets {
                            if let Err(e) = store.refetch(&key).await {
                                warn!(key = %key, error = %e, "background refetch failed");
                            }
                        }
                    }
                });
            }
        }
    }

    async fn refetch_families(&self, prefixes: &[QueryKey]) {
        for prefix in prefixes {
            let targets: Vec<QueryKey> = self
                .store
                .entries()
                .into_iter()
                .map(|e| e.key)
                .filter(|k| k.starts_with(prefix))
                .collect();
            for key in targets {
                if let Err(e) = self.store.refetch(&key).await {
                    warn!(key = %key, error = %e, "immediate refetch failed");
                }
            }
        }
    }
}
