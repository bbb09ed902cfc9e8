//! Usage-derived warming hints.

use super::plans::{self, WarmTarget};

/// What warming knows about a user. Collected by the embedder from its own
/// analytics; every field is optional in spirit, zeroes mean "unknown".
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub role: String,
    pub last_login_days: u32,
    pub dashboard_views: u32,
    /// Fraction of sessions touching realtime views, in [0, 1].
    pub realtime_usage: f64,
    /// Fraction of sessions touching analytics views, in [0, 1].
    pub analytics_usage: f64,
}

/// Closed set of behavior classifications. A profile can carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorTag {
    AdminUser,
    ActiveUser,
    DashboardHeavy,
    RealtimeUser,
    AnalyticsUser,
    BasicUser,
}

impl BehaviorTag {
    pub(super) fn targets(&self, user_id: &str) -> Vec<WarmTarget> {
        match self {
            BehaviorTag::AdminUser => plans::admin(),
            BehaviorTag::ActiveUser => plans::dashboard_essential(),
            BehaviorTag::DashboardHeavy => {
                let mut targets = plans::dashboard_secondary();
                targets.extend(plans::dashboard_optional());
                targets
            }
            BehaviorTag::RealtimeUser => plans::realtime(),
            BehaviorTag::AnalyticsUser => plans::analytics(),
            BehaviorTag::BasicUser => plans::essential(user_id),
        }
    }
}

/// Classify a profile. Rules are independent; `BasicUser` only when nothing
/// else matched.
#[must_use]
pub fn infer_behavior_tags(profile: &UserProfile) -> Vec<BehaviorTag> {
    let mut tags = Vec::new();
    if profile.role == "admin" {
        tags.push(BehaviorTag::AdminUser);
    }
    if profile.last_login_days < 7 {
        tags.push(BehaviorTag::ActiveUser);
    }
    if profile.dashboard_views > 50 {
        tags.push(BehaviorTag::DashboardHeavy);
    }
    if profile.realtime_usage > 0.7 {
        tags.push(BehaviorTag::RealtimeUser);
    }
    if profile.analytics_usage > 0.5 {
        tags.push(BehaviorTag::AnalyticsUser);
    }
    if tags.is_empty() {
        tags.push(BehaviorTag::BasicUser);
    }
    tags
}
