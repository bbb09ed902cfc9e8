//! Plan and permission resolution for user metadata.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use spintrack_core::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw metadata as stored by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub plan_id: Option<String>,
    /// Epoch ms; only meaningful for trial plans.
    pub trial_ends_at_ms: Option<i64>,
    #[serde(default)]
    pub is_admin: bool,
    /// Explicit grants; `None` falls back to the plan defaults.
    pub permissions: Option<Vec<String>>,
}

/// Patch applied over the current metadata. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub plan_id: Option<String>,
    pub trial_ends_at_ms: Option<i64>,
    pub is_admin: Option<bool>,
    pub permissions: Option<Vec<String>>,
}

impl MetadataPatch {
    fn apply(&self, current: &UserMetadata) -> UserMetadata {
        UserMetadata {
            plan_id: self.plan_id.clone().or_else(|| current.plan_id.clone()),
            trial_ends_at_ms: self.trial_ends_at_ms.or(current.trial_ends_at_ms),
            is_admin: self.is_admin.unwrap_or(current.is_admin),
            permissions: self
                .permissions
                .clone()
                .or_else(|| current.permissions.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTier {
    Free,
    Trial,
    Pro,
    Enterprise,
}

impl PlanTier {
    fn default_permissions(&self) -> Vec<String> {
        let grants: &[&str] = match self {
            PlanTier::Free => &["dashboard:view"],
            PlanTier::Trial => &["dashboard:view", "analytics:view"],
            PlanTier::Pro => &[
                "dashboard:view",
                "analytics:view",
                "realtime:view",
                "export:data",
            ],
            PlanTier::Enterprise => &[
                "dashboard:view",
                "analytics:view",
                "realtime:view",
                "export:data",
                "api:access",
            ],
        };
        grants.iter().map(|g| (*g).to_owned()).collect()
    }
}

/// Plan and permissions after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub plan: PlanTier,
    pub permissions: Vec<String>,
    pub is_admin: bool,
}

impl ResolvedAccess {
    pub fn has_permission(&self, grant: &str) -> bool {
        self.is_admin || self.permissions.iter().any(|p| p == grant)
    }
}

/// Normalize raw metadata into effective access.
///
/// Unknown and missing plan ids resolve to free, an elapsed trial is
/// downgraded to free, and admin overrides the plan entirely.
#[must_use]
pub fn resolve_access(metadata: &UserMetadata, now_ms: i64) -> ResolvedAccess {
    let plan_id = metadata
        .plan_id
        .as_deref()
        .unwrap_or("free")
        .trim()
        .to_ascii_lowercase();
    let plan = match plan_id.as_str() {
        "trial" => {
            let elapsed = metadata.trial_ends_at_ms.is_some_and(|ends| ends <= now_ms);
            if elapsed {
                debug!("trial elapsed, downgrading to free");
                PlanTier::Free
            } else {
                PlanTier::Trial
            }
        }
        "pro" => PlanTier::Pro,
        "enterprise" => PlanTier::Enterprise,
        "free" => PlanTier::Free,
        other => {
            warn!(plan = other, "unknown plan id, treating as free");
            PlanTier::Free
        }
    };

    let permissions = metadata
        .permissions
        .clone()
        .unwrap_or_else(|| plan.default_permissions());
    ResolvedAccess {
        plan,
        permissions,
        is_admin: metadata.is_admin,
    }
}

/// Where metadata lives upstream.
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<UserMetadata>;
    async fn save(&self, user_id: &str, metadata: &UserMetadata) -> Result<()>;
}

/// Per-user metadata cache with optimistic writes.
pub struct UserMetadataCache {
    backend: Arc<dyn MetadataBackend>,
    cached: DashMap<String, UserMetadata>,
}

impl UserMetadataCache {
    pub fn new(backend: Arc<dyn MetadataBackend>) -> Self {
        Self {
            backend,
            cached: DashMap::new(),
        }
    }

    /// The user's raw metadata, loading it on first access.
    pub async fn metadata(&self, user_id: &str) -> Result<UserMetadata> {
        if let Some(cached) = self.cached.get(user_id) {
            return Ok(cached.clone());
        }
        let loaded = self.backend.load(user_id).await?;
        self.cached.insert(user_id.to_owned(), loaded.clone());
        Ok(loaded)
    }

    /// The user's effective access at `now_ms`.
    pub async fn access(&self, user_id: &str, now_ms: i64) -> Result<ResolvedAccess> {
        Ok(resolve_access(&self.metadata(user_id).await?, now_ms))
    }

    /// Apply a patch optimistically: the cache reflects the patched value
    /// immediately, and is rolled back if the backend write fails.
    pub async fn update(&self, user_id: &str, patch: MetadataPatch) -> Result<UserMetadata> {
        let previous = self.metadata(user_id).await?;
        let updated = patch.apply(&previous);
        self.cached.insert(user_id.to_owned(), updated.clone());

        match self.backend.save(user_id, &updated).await {
            Ok(()) => Ok(updated),
            Err(e) => {
                warn!(user = user_id, error = %e, "metadata write failed, rolling back");
                self.cached.insert(user_id.to_owned(), previous);
                Err(e)
            }
        }
    }

    /// Drop the cached copy so the next access reloads.
    pub fn invalidate(&self, user_id: &str) {
        self.cached.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use spintrack_core::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeBackend {
        stored: Mutex<UserMetadata>,
        loads: AtomicUsize,
        fail_save: AtomicBool,
    }

    impl FakeBackend {
        fn with(metadata: UserMetadata) -> Arc<Self> {
            Arc::new(Self {
                stored: Mutex::new(metadata),
                loads: AtomicUsize::new(0),
                fail_save: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl MetadataBackend for FakeBackend {
        async fn load(&self, _user_id: &str) -> Result<UserMetadata> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.stored.lock().clone())
        }

        async fn save(&self, _user_id: &str, metadata: &UserMetadata) -> Result<()> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(Error::server(500, "metadata write rejected"));
            }
            *self.stored.lock() = metadata.clone();
            Ok(())
        }
    }

    #[test]
    fn unknown_and_missing_plans_resolve_to_free() {
        let free = resolve_access(&UserMetadata::default(), 0);
        assert_eq!(free.plan, PlanTier::Free);
        assert_eq!(free.permissions, vec!["dashboard:view".to_owned()]);

        let odd = resolve_access(
            &UserMetadata {
                plan_id: Some("  GOLD  ".into()),
                ..UserMetadata::default()
            },
            0,
        );
        assert_eq!(odd.plan, PlanTier::Free);
    }

    #[test]
    fn elapsed_trial_downgrades_to_free() {
        let metadata = UserMetadata {
            plan_id: Some("TRIAL".into()),
            trial_ends_at_ms: Some(1_000),
            ..UserMetadata::default()
        };
        assert_eq!(resolve_access(&metadata, 999).plan, PlanTier::Trial);
        assert_eq!(resolve_access(&metadata, 1_000).plan, PlanTier::Free);
    }

    #[test]
    fn admin_overrides_any_grant_check() {
        let metadata = UserMetadata {
            plan_id: Some("free".into()),
            is_admin: true,
            ..UserMetadata::default()
        };
        let access = resolve_access(&metadata, 0);
        assert!(access.has_permission("export:data"));
        assert_eq!(access.plan, PlanTier::Free);
    }

    #[test]
    fn explicit_permissions_beat_plan_defaults() {
        let metadata = UserMetadata {
            plan_id: Some("pro".into()),
            permissions: Some(vec!["dashboard:view".into()]),
            ..UserMetadata::default()
        };
        let access = resolve_access(&metadata, 0);
        assert!(!access.has_permission("export:data"));
    }

    #[tokio::test]
    async fn metadata_is_loaded_once_and_cached() {
        let backend = FakeBackend::with(UserMetadata::default());
        let cache = UserMetadataCache::new(backend.clone());

        cache.metadata("u1").await.unwrap();
        cache.access("u1", 0).await.unwrap();
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);

        cache.invalidate("u1");
        cache.metadata("u1").await.unwrap();
        assert_eq!(backend.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_update_rolls_the_cache_back() {
        let backend = FakeBackend::with(UserMetadata {
            plan_id: Some("free".into()),
            ..UserMetadata::default()
        });
        let cache = UserMetadataCache::new(backend.clone());
        backend.fail_save.store(true, Ordering::SeqCst);

        let err = cache
            .update(
                "u1",
                MetadataPatch {
                    plan_id: Some("pro".into()),
                    ..MetadataPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Server { status: 500, .. }));
        assert_eq!(
            cache.metadata("u1").await.unwrap().plan_id.as_deref(),
            Some("free")
        );
    }

    #[tokio::test]
    async fn successful_update_persists_the_patch() {
        let backend = FakeBackend::with(UserMetadata::default());
        let cache = UserMetadataCache::new(backend.clone());

        let updated = cache
            .update(
                "u1",
                MetadataPatch {
                    plan_id: Some("enterprise".into()),
                    is_admin: Some(true),
                    ..MetadataPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.plan_id.as_deref(), Some("enterprise"));
        assert!(backend.stored.lock().is_admin);
    }
}
