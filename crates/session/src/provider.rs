//! The identity provider contract.

use async_trait::async_trait;
use spintrack_core::Result;

/// An authenticated session as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    /// Epoch milliseconds.
    pub expires_at_ms: i64,
}

impl Session {
    /// Milliseconds until expiry at `now_ms`. Negative when already expired.
    #[must_use]
    pub fn time_to_expiry_ms(&self, now_ms: i64) -> i64 {
        self.expires_at_ms - now_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// Auth lifecycle notifications from the provider.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(AuthUser),
}

/// The upstream identity service. One implementation per auth backend;
/// tests use a counting fake.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, if any. Does not refresh.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Exchange the refresh token for a new session.
    async fn refresh_session(&self) -> Result<Session>;

    async fn get_user(&self) -> Result<Option<AuthUser>>;
}
