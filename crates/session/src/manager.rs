//! Session validation and refresh coordination.

use crate::provider::{AuthEvent, IdentityProvider, Session};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use spintrack_core::{constants, QueryKey, Result};
use spintrack_store::QueryStore;
use spintrack_utils::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Validation results are reused for this long.
    pub validation_cache_ttl_ms: i64,
    /// Refresh proactively when expiry is closer than this.
    pub refresh_threshold_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validation_cache_ttl_ms: constants::VALIDATION_CACHE_TTL_MS,
            refresh_threshold_ms: constants::REFRESH_THRESHOLD_MS,
        }
    }
}

/// Derived view of the coordinator's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session: Option<Session>,
    /// Expiry of the current session, if any.
    pub expires_at_ms: Option<i64>,
    /// Epoch ms of the last validation, 0 if never validated.
    pub last_validated: i64,
    /// True exactly when time to expiry is below the refresh threshold.
    pub needs_refresh: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub validations: u64,
    pub validation_cache_hits: u64,
    pub refreshes: u64,
    pub failed_refreshes: u64,
}

#[derive(Debug, Clone, Copy)]
struct ValidationRecord {
    at: i64,
    valid: bool,
}

type SharedRefresh = Shared<BoxFuture<'static, Result<Session>>>;

/// Coordinates session validation, token refresh, and the cache entries
/// derived from auth state.
///
/// Refresh is single-flight: concurrent callers join the in-flight refresh
/// rather than issuing parallel provider calls. A refresh failure propagates
/// to every joined caller; there is no automatic retry for auth.
pub struct SessionCoordinator {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn QueryStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    current: RwLock<Option<Session>>,
    validation: Mutex<Option<ValidationRecord>>,
    refresh_in_flight: Mutex<Option<SharedRefresh>>,
    proactive: Mutex<Option<JoinHandle<()>>>,
    validations: AtomicU64,
    validation_cache_hits: AtomicU64,
    refreshes: AtomicU64,
    failed_refreshes: AtomicU64,
}

impl SessionCoordinator {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn QueryStore>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            store,
            clock,
            config,
            current: RwLock::new(None),
            validation: Mutex::new(None),
            refresh_in_flight: Mutex::new(None),
            proactive: Mutex::new(None),
            validations: AtomicU64::new(0),
            validation_cache_hits: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
        })
    }

    fn session_key(user_id: &str) -> QueryKey {
        QueryKey::of(["session"]).join(user_id)
    }

    fn user_family_prefixes(user_id: &str) -> [QueryKey; 2] {
        [
            QueryKey::of(["user", "profile"]).join(user_id),
            QueryKey::of(["user", "preferences"]).join(user_id),
        ]
    }

    /// Whether the current session is valid, reusing a recent answer.
    ///
    /// `force` bypasses the validation cache. The answer is cached for
    /// `validation_cache_ttl_ms` so hot paths can gate on it cheaply.
    pub async fn validate_session(&self, force: bool) -> Result<bool> {
        let now = self.clock.now_ms();
        if !force {
            if let Some(record) = *self.validation.lock() {
                if now - record.at < self.config.validation_cache_ttl_ms {
                    self.validation_cache_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(record.valid);
                }
            }
        }

        self.validations.fetch_add(1, Ordering::Relaxed);
        let session = self.provider.get_session().await?;
        let valid = session
            .as_ref()
            .is_some_and(|s| s.time_to_expiry_ms(now) > 0);
        *self.current.write() = session;
        *self.validation.lock() = Some(ValidationRecord { at: now, valid });
        debug!(valid, "session validated");
        Ok(valid)
    }

    /// Refresh the session, joining an in-flight refresh if one exists.
    pub async fn refresh_token(self: &Arc<Self>) -> Result<Session> {
        let (shared, owner) = {
            let mut guard = self.refresh_in_flight.lock();
            match &*guard {
                Some(existing) => (existing.clone(), false),
                None => {
                    let coordinator = Arc::clone(self);
                    let shared = async move { coordinator.do_refresh().await }.boxed().shared();
                    *guard = Some(shared.clone());
                    (shared, true)
                }
            }
        };
        let result = shared.await;
        if owner {
            *self.refresh_in_flight.lock() = None;
        }
        result
    }

    async fn do_refresh(self: Arc<Self>) -> Result<Session> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        match self.provider.refresh_session().await {
            Ok(session) => {
                info!(user = %session.user_id, "session refreshed");
                self.apply_session(&session).await;
                self.schedule_proactive_refresh(&session);
                Ok(session)
            }
            Err(e) => {
                self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "session refresh failed");
                Err(e)
            }
        }
    }

    /// Record a fresh session: coordinator state, validation cache, and the
    /// cached session entry.
    async fn apply_session(&self, session: &Session) {
        let now = self.clock.now_ms();
        *self.current.write() = Some(session.clone());
        *self.validation.lock() = Some(ValidationRecord { at: now, valid: true });
        self.store
            .set(
                &Self::session_key(&session.user_id),
                json!({
                    "userId": session.user_id,
                    "expiresAt": session.expires_at_ms,
                }),
            )
            .await;
    }

    /// Arm a one-shot refresh at `expires_at − refresh_threshold`,
    /// replacing any previously armed one.
    fn schedule_proactive_refresh(self: &Arc<Self>, session: &Session) {
        let delay_ms = (session.time_to_expiry_ms(self.clock.now_ms())
            - self.config.refresh_threshold_ms)
            .max(0);
        let coordinator = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
            debug!("proactive session refresh firing");
            if let Err(e) = coordinator.refresh_token().await {
                warn!(error = %e, "proactive refresh failed");
            }
        });
        if let Some(previous) = self.proactive.lock().replace(task) {
            previous.abort();
        }
    }

    /// Keep cache state in step with provider auth notifications.
    pub async fn handle_auth_event(self: &Arc<Self>, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                self.apply_session(&session).await;
                self.schedule_proactive_refresh(&session);
                for prefix in Self::user_family_prefixes(&session.user_id) {
                    if let Err(e) = self.store.invalidate_prefix(&prefix).await {
                        warn!(prefix = %prefix, error = %e, "sign-in invalidation failed");
                    }
                }
            }
            AuthEvent::SignedOut => {
                let previous = self.current.write().take();
                *self.validation.lock() = None;
                if let Some(task) = self.proactive.lock().take() {
                    task.abort();
                }
                self.store.remove_prefix(&QueryKey::of(["session"])).await;
                if let Some(session) = previous {
                    info!(user = %session.user_id, "signed out, dropping user cache entries");
                    let user_prefix = QueryKey::of(["user"]);
                    let user_keys: Vec<QueryKey> = self
                        .store
                        .entries()
                        .into_iter()
                        .map(|entry| entry.key)
                        .filter(|key| {
                            key.starts_with(&user_prefix)
                                && key.contains_segment(&session.user_id)
                        })
                        .collect();
                    for key in user_keys {
                        self.store.remove(&key).await;
                    }
                }
            }
            AuthEvent::UserUpdated(user) => {
                let prefix = QueryKey::of(["user", "profile"]).join(&user.id);
                if let Err(e) = self.store.invalidate_prefix(&prefix).await {
                    warn!(prefix = %prefix, error = %e, "profile invalidation failed");
                }
            }
        }
    }

    pub fn session_state(&self) -> SessionState {
        let now = self.clock.now_ms();
        let session = self.current.read().clone();
        let needs_refresh = session
            .as_ref()
            .is_some_and(|s| s.time_to_expiry_ms(now) < self.config.refresh_threshold_ms);
        SessionState {
            expires_at_ms: session.as_ref().map(|s| s.expires_at_ms),
            session,
            last_validated: self.validation.lock().map_or(0, |record| record.at),
            needs_refresh,
        }
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            validations: self.validations.load(Ordering::Relaxed),
            validation_cache_hits: self.validation_cache_hits.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failed_refreshes: self.failed_refreshes.load(Ordering::Relaxed),
        }
    }

    /// Cancel the armed proactive refresh.
    pub fn shutdown(&self) {
        if let Some(task) = self.proactive.lock().take() {
            task.abort();
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
