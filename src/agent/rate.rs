//! Per-(connection, action) attempt tracking.
//!
//! The tracker remembers when each connection/action pair was last
//! attempted and answers whether enough time has passed to try it again.
//! Timestamps only move forward.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AgentProfile;

/// Identifies one action on one connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RateKey {
    pub connection: String,
    pub action: String,
}

impl RateKey {
    pub fn new(connection: &str, action: &str) -> Self {
        Self {
            connection: connection.to_string(),
            action: action.to_string(),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.connection, self.action)
    }
}

/// Last-attempt timestamps plus the minimum spacing for each key.
#[derive(Debug, Default)]
pub struct RateTracker {
    limits: HashMap<RateKey, Duration>,
    defaults: HashMap<String, Duration>,
    last: Mutex<HashMap<RateKey, DateTime<Utc>>>,
}

impl RateTracker {
    /// Tracker with no intervals: every key is always eligible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker using the interval settings of every configured connection.
    pub fn from_profile(profile: &AgentProfile) -> Self {
        let mut tracker = Self::new();
        for settings in &profile.config {
            for (action, secs) in &settings.intervals {
                tracker.limits.insert(
                    RateKey::new(&settings.name, action),
                    Duration::from_secs(*secs),
                );
            }
            if let Some(secs) = settings.default_interval {
                tracker
                    .defaults
                    .insert(settings.name.clone(), Duration::from_secs(secs));
            }
        }
        tracker
    }

    /// Set the minimum interval for one key.
    pub fn with_interval(mut self, connection: &str, action: &str, interval: Duration) -> Self {
        self.limits.insert(RateKey::new(connection, action), interval);
        self
    }

    /// Minimum spacing between two attempts of `action` on `connection`.
    pub fn min_interval(&self, connection: &str, action: &str) -> Duration {
        self.limits
            .get(&RateKey::new(connection, action))
            .or_else(|| self.defaults.get(connection))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Time left before the key becomes eligible, or `None` if it already is.
    ///
    /// A clock that moved backwards counts as no time elapsed.
    pub fn remaining(&self, connection: &str, action: &str, now: DateTime<Utc>) -> Option<Duration> {
        let interval = self.min_interval(connection, action);
        if interval.is_zero() {
            return None;
        }
        let last = self.last_attempt(connection, action)?;
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        interval.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Whether enough time has passed since the last attempt.
    pub fn is_eligible(&self, connection: &str, action: &str, now: DateTime<Utc>) -> bool {
        self.remaining(connection, action, now).is_none()
    }

    /// Stamp an attempt at `at`. Earlier stamps never overwrite later ones.
    pub fn record(&self, connection: &str, action: &str, at: DateTime<Utc>) {
        let mut last = self.last.lock().unwrap();
        let entry = last.entry(RateKey::new(connection, action)).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    /// When the key was last attempted.
    pub fn last_attempt(&self, connection: &str, action: &str) -> Option<DateTime<Utc>> {
        self.last
            .lock()
            .unwrap()
            .get(&RateKey::new(connection, action))
            .copied()
    }

    /// Every recorded key with its last attempt, sorted by key.
    pub fn snapshot(&self) -> Vec<(RateKey, DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .last
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn test_unrecorded_key_is_eligible() {
        let tracker = RateTracker::new().with_interval("x", "post", Duration::from_secs(60));
        assert!(tracker.is_eligible("x", "post", t0()));
        assert_eq!(tracker.last_attempt("x", "post"), None);
    }

    #[test]
    fn test_cooldown_window() {
        let tracker = RateTracker::new().with_interval("x", "post", Duration::from_secs(60));
        tracker.record("x", "post", t0());
        assert!(!tracker.is_eligible("x", "post", t0() + secs(30)));
        assert_eq!(
            tracker.remaining("x", "post", t0() + secs(30)),
            Some(Duration::from_secs(30))
        );
        assert!(tracker.is_eligible("x", "post", t0() + secs(60)));
        assert!(tracker.is_eligible("x", "post", t0() + secs(61)));
    }

    #[test]
    fn test_zero_interval_always_eligible() {
        let tracker = RateTracker::new();
        tracker.record("x", "like", t0());
        assert!(tracker.is_eligible("x", "like", t0()));
    }

    #[test]
    fn test_keys_are_independent() {
        let tracker = RateTracker::new()
            .with_interval("x", "post", Duration::from_secs(60))
            .with_interval("y", "post", Duration::from_secs(60));
        tracker.record("x", "post", t0());
        assert!(!tracker.is_eligible("x", "post", t0()));
        assert!(tracker.is_eligible("y", "post", t0()));
    }

    #[test]
    fn test_record_is_monotonic() {
        let tracker = RateTracker::new();
        tracker.record("x", "post", t0() + secs(10));
        tracker.record("x", "post", t0());
        assert_eq!(tracker.last_attempt("x", "post"), Some(t0() + secs(10)));
    }

    #[test]
    fn test_clock_going_backwards_keeps_cooldown() {
        let tracker = RateTracker::new().with_interval("x", "post", Duration::from_secs(60));
        tracker.record("x", "post", t0());
        assert_eq!(
            tracker.remaining("x", "post", t0() - secs(5)),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_from_profile_reads_intervals_and_defaults() {
        let mut settings = ConnectionSettings::new("sonic").with_interval("transfer", 120);
        settings.default_interval = Some(30);
        let profile = AgentProfile {
            config: vec![settings],
            ..Default::default()
        };
        let tracker = RateTracker::from_profile(&profile);
        assert_eq!(
            tracker.min_interval("sonic", "transfer"),
            Duration::from_secs(120)
        );
        assert_eq!(
            tracker.min_interval("sonic", "get-balance"),
            Duration::from_secs(30)
        );
        assert_eq!(tracker.min_interval("other", "x"), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_sorted() {
        let tracker = RateTracker::new();
        tracker.record("b", "x", t0());
        tracker.record("a", "y", t0());
        let snap = tracker.snapshot();
        assert_eq!(snap[0].0.to_string(), "a.y");
        assert_eq!(snap[1].0.to_string(), "b.x");
    }
}
