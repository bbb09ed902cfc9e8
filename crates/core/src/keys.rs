//! Structured cache keys identifying logical resources in the query store.
//!
//! A key is an ordered sequence of string segments, e.g.
//! `["dashboard", "essential", "metrics", "<user-id>"]`. Keys form an
//! implicit hierarchy: a key whose leading segments equal another key's
//! segments belongs to that key's family, which is what cascade and prefix
//! invalidation operate on. Matching is always structural, whole segments
//! compared in order, never substring matching on a serialized form.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, structural cache key.
///
/// Equality is structural; the canonical serialized form (a JSON array of
/// strings) is used wherever a flat map key or storage key is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    segments: Vec<String>,
}

impl QueryKey {
    /// Build a key from segments. Empty keys are invalid.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(Error::validation("cache key must have at least one segment"));
        }
        if segments.iter().any(String::is_empty) {
            return Err(Error::validation("cache key segments must be non-empty"));
        }
        Ok(Self { segments })
    }

    /// Infallible constructor for statically known keys.
    ///
    /// Panics on empty input, which is a programming error for literal keys.
    #[must_use]
    pub fn of<const N: usize>(segments: [&str; N]) -> Self {
        assert!(N > 0, "cache key must have at least one segment");
        Self {
            segments: segments.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Return a new key with an extra trailing segment.
    #[must_use]
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Structural family membership: does this key start with `prefix`?
    #[must_use]
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Whole-segment containment, used for user and priority scoping.
    #[must_use]
    pub fn contains_segment(&self, segment: &str) -> bool {
        self.segments.iter().any(|s| s == segment)
    }

    /// Canonical serialized form, stable across processes.
    #[must_use]
    pub fn canonical(&self) -> String {
        // Vec<String> to JSON array cannot fail
        serde_json::to_string(&self.segments).unwrap_or_default()
    }

    /// Parse a canonical form back into a key.
    pub fn parse(canonical: &str) -> Result<Self> {
        let segments: Vec<String> = serde_json::from_str(canonical)
            .map_err(|e| Error::serialization(format!("invalid cache key '{canonical}'"), e))?;
        Self::new(segments)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Priority tier of a cached resource, encoded as a key segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Essential,
    Secondary,
    Optional,
}

impl Priority {
    /// The key segment this tier appears as, e.g. `["dashboard","essential",..]`.
    #[must_use]
    pub const fn as_segment(&self) -> &'static str {
        match self {
            Priority::Essential => "essential",
            Priority::Secondary => "secondary",
            Priority::Optional => "optional",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip() {
        let key = QueryKey::of(["dashboard", "essential", "metrics", "U1"]);
        let parsed = QueryKey::parse(&key.canonical()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn empty_keys_are_invalid() {
        assert!(QueryKey::new(Vec::<String>::new()).is_err());
        assert!(QueryKey::new(vec!["a", ""]).is_err());
    }

    #[test]
    fn prefix_matching_is_structural() {
        let key = QueryKey::of(["dashboard", "essential", "metrics"]);
        assert!(key.starts_with(&QueryKey::of(["dashboard"])));
        assert!(key.starts_with(&QueryKey::of(["dashboard", "essential"])));
        assert!(!key.starts_with(&QueryKey::of(["dash"])));
        assert!(!key.starts_with(&QueryKey::of(["dashboard", "secondary"])));
    }

    #[test]
    fn segment_containment_is_whole_segment() {
        let key = QueryKey::of(["user", "preferences", "U12"]);
        assert!(key.contains_segment("U12"));
        assert!(!key.contains_segment("U1"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Arbitrary segment content (dots, quotes, unicode) survives
            // the canonical form; Display is lossy, canonical is not.
            #[test]
            fn canonical_form_is_lossless(segments in prop::collection::vec("[^\u{0}]{1,12}", 1..6)) {
                let key = QueryKey::new(segments).unwrap();
                let parsed = QueryKey::parse(&key.canonical()).unwrap();
                prop_assert_eq!(&key, &parsed);
            }

            #[test]
            fn joined_keys_stay_in_the_family(
                segments in prop::collection::vec("[a-z]{1,8}", 1..5),
                extra in "[a-z]{1,8}",
            ) {
                let base = QueryKey::new(segments).unwrap();
                prop_assert!(base.join(extra).starts_with(&base));
            }
        }
    }
}
