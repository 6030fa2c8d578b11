//! Weighted task selection.
//!
//! Selection is split in two: [`candidate_set`] decides which tasks may run
//! right now and with what effective weight, then [`pick_weighted`] draws
//! one of them proportionally to weight. Neither step performs I/O or
//! mutates anything, so a cycle that selects nothing leaves no trace.

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::config::AgentProfile;
use crate::connections::ConnectionRegistry;

use super::rate::RateTracker;

/// A task that may be dispatched this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Position of the task in the profile's task list
    pub index: usize,
    pub task: String,
    pub connection: String,
    pub action: String,
    /// Base weight times the active time-of-day multiplier
    pub weight: f64,
}

/// Why a task is not a candidate this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Exclusion {
    /// Effective weight is zero
    ZeroWeight,
    /// Effective weight overflowed to infinity
    InvalidWeight,
    /// No ready connection exposes the task's action
    Unresolved,
    /// The connection/action pair is still cooling down
    CoolingDown { remaining_secs: u64 },
}

/// Result of filtering the profile's tasks for one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateSet {
    /// Active time-of-day period, when time-based weights are on
    pub period: Option<String>,
    pub candidates: Vec<Candidate>,
    pub excluded: Vec<(String, Exclusion)>,
}

impl CandidateSet {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of tasks excluded because they could not be resolved.
    pub fn unresolved(&self) -> usize {
        self.excluded
            .iter()
            .filter(|(_, e)| *e == Exclusion::Unresolved)
            .count()
    }
}

/// Name of the first configured period containing `now`.
///
/// Hours are taken in the profile's fixed UTC offset when set, otherwise in
/// host local time.
pub fn current_period(profile: &AgentProfile, now: DateTime<Utc>) -> Option<String> {
    let hour = match profile
        .utc_offset_hours
        .and_then(|h| FixedOffset::east_opt(h * 3600))
    {
        Some(offset) => now.with_timezone(&offset).hour(),
        None => now.with_timezone(&Local).hour(),
    };
    profile
        .time_periods
        .iter()
        .find(|p| p.contains(hour))
        .map(|p| p.name.clone())
}

/// Tasks eligible to run at `now`, with effective weights.
pub fn candidate_set(
    profile: &AgentProfile,
    registry: &ConnectionRegistry,
    tracker: &RateTracker,
    now: DateTime<Utc>,
) -> CandidateSet {
    let period = if profile.use_time_based_weights {
        current_period(profile, now)
    } else {
        None
    };
    let multiplier = profile.multiplier_for(period.as_deref());

    let mut set = CandidateSet {
        period,
        ..Default::default()
    };

    for (index, task) in profile.tasks.iter().enumerate() {
        let weight = task.weight * multiplier;
        if weight.is_infinite() {
            warn!(task = %task.name, multiplier, "Effective weight is not finite; excluding task");
            set.excluded.push((task.name.clone(), Exclusion::InvalidWeight));
            continue;
        }
        if weight.is_nan() || weight <= 0.0 {
            set.excluded.push((task.name.clone(), Exclusion::ZeroWeight));
            continue;
        }
        let Some((connection, action)) = registry.resolve(task) else {
            set.excluded.push((task.name.clone(), Exclusion::Unresolved));
            continue;
        };
        if let Some(remaining) = tracker.remaining(&connection, &action, now) {
            set.excluded.push((
                task.name.clone(),
                Exclusion::CoolingDown {
                    remaining_secs: remaining.as_secs(),
                },
            ));
            continue;
        }
        set.candidates.push(Candidate {
            index,
            task: task.name.clone(),
            connection,
            action,
            weight,
        });
    }
    set
}

/// Draw one candidate with probability proportional to its weight.
///
/// Each candidate owns the half-open slice `[cumulative, cumulative + weight)`
/// of `[0, total)`, so a draw always lands in exactly one slice. Equal
/// weights get equal slices; list order never breaks a tie.
///
/// Weights are divided by the largest one first so that the total stays
/// finite for any set of finite weights.
pub fn pick_weighted<'a, R: Rng + ?Sized>(
    candidates: &'a [Candidate],
    rng: &mut R,
) -> Option<&'a Candidate> {
    let max = candidates
        .iter()
        .map(|c| c.weight)
        .filter(|w| w.is_finite())
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return None;
    }
    let share = |c: &Candidate| {
        if c.weight.is_finite() && c.weight > 0.0 {
            c.weight / max
        } else {
            0.0
        }
    };
    let total: f64 = candidates.iter().map(share).sum();
    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for candidate in candidates {
        cumulative += share(candidate);
        if draw < cumulative {
            return Some(candidate);
        }
    }
    // float rounding can leave the draw just past the last boundary
    candidates.iter().rev().find(|c| share(*c) > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionSettings, TaskConfig, TimePeriod};
    use crate::connections::{ActionSpec, ConsoleConnection};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use std::time::Duration;

    fn registry(actions: &[&str]) -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::new();
        registry
            .register(Arc::new(ConsoleConnection::new(
                "console",
                actions.iter().map(|a| ActionSpec::new(a)).collect(),
            )))
            .unwrap();
        registry
    }

    fn candidate(task: &str, weight: f64) -> Candidate {
        Candidate {
            index: 0,
            task: task.into(),
            connection: "console".into(),
            action: task.into(),
            weight,
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_weighted_draw_is_proportional() {
        let candidates = vec![candidate("a", 1.0), candidate("b", 3.0)];
        let mut rng = StdRng::seed_from_u64(7);
        let mut a = 0;
        for _ in 0..4000 {
            if pick_weighted(&candidates, &mut rng).unwrap().task == "a" {
                a += 1;
            }
        }
        assert!((850..=1150).contains(&a), "a picked {} times", a);
    }

    #[test]
    fn test_equal_weights_share_draws_evenly() {
        let candidates = vec![
            candidate("a", 1.0),
            candidate("b", 1.0),
            candidate("c", 1.0),
        ];
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            match pick_weighted(&candidates, &mut rng).unwrap().task.as_str() {
                "a" => counts[0] += 1,
                "b" => counts[1] += 1,
                _ => counts[2] += 1,
            }
        }
        for count in counts {
            assert!((850..=1150).contains(&count), "counts {:?}", counts);
        }
    }

    #[test]
    fn test_later_tied_candidate_is_drawn() {
        // the later of two tied candidates gets its full share, 2.0 of 4.5
        let candidates = vec![
            candidate("light", 0.5),
            candidate("first", 2.0),
            candidate("second", 2.0),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let mut second = 0;
        for _ in 0..4500 {
            if pick_weighted(&candidates, &mut rng).unwrap().task == "second" {
                second += 1;
            }
        }
        // expected 2000 of 4500
        assert!((1800..=2200).contains(&second), "second picked {} times", second);
    }

    #[test]
    fn test_huge_weights_still_draw() {
        let candidates = vec![candidate("a", f64::MAX), candidate("b", f64::MAX)];
        let mut rng = StdRng::seed_from_u64(5);
        let mut a = 0;
        for _ in 0..1000 {
            if pick_weighted(&candidates, &mut rng).unwrap().task == "a" {
                a += 1;
            }
        }
        assert!((400..=600).contains(&a), "a picked {} times", a);
    }

    #[test]
    fn test_single_candidate_always_picked() {
        let candidates = vec![candidate("only", 0.25)];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(pick_weighted(&candidates, &mut rng).unwrap().task, "only");
        }
    }

    #[test]
    fn test_empty_draw() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_weighted(&[], &mut rng).is_none());
    }

    #[test]
    fn test_zero_weight_excluded() {
        let profile = AgentProfile {
            tasks: vec![TaskConfig::new("post", 0.0), TaskConfig::new("like", 1.0)],
            ..Default::default()
        };
        let set = candidate_set(&profile, &registry(&["post", "like"]), &RateTracker::new(), noon());
        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].task, "like");
        assert_eq!(set.excluded, vec![("post".to_string(), Exclusion::ZeroWeight)]);
    }

    #[test]
    fn test_overflowing_weight_excluded() {
        let mut profile = AgentProfile {
            tasks: vec![TaskConfig::new("post", f64::MAX), TaskConfig::new("like", 1.0)],
            use_time_based_weights: true,
            utc_offset_hours: Some(0),
            ..Default::default()
        };
        profile.time_based_multipliers.insert("day".into(), 4.0);
        let set = candidate_set(&profile, &registry(&["post", "like"]), &RateTracker::new(), noon());
        assert_eq!(set.candidates.len(), 1);
        assert_eq!(set.candidates[0].task, "like");
        assert_eq!(set.excluded, vec![("post".to_string(), Exclusion::InvalidWeight)]);
    }

    #[test]
    fn test_candidates_carry_task_index() {
        let profile = AgentProfile {
            tasks: vec![
                TaskConfig::new("post", 0.0),
                TaskConfig::new("like", 1.0),
                TaskConfig::new("post", 1.0),
            ],
            ..Default::default()
        };
        let set = candidate_set(&profile, &registry(&["post", "like"]), &RateTracker::new(), noon());
        let indices: Vec<usize> = set.candidates.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_unresolved_excluded() {
        let profile = AgentProfile {
            tasks: vec![TaskConfig::new("dance", 1.0)],
            ..Default::default()
        };
        let set = candidate_set(&profile, &registry(&["post"]), &RateTracker::new(), noon());
        assert!(set.is_empty());
        assert_eq!(set.unresolved(), 1);
    }

    #[test]
    fn test_cooling_down_excluded() {
        let profile = AgentProfile {
            tasks: vec![TaskConfig::new("post", 1.0)],
            ..Default::default()
        };
        let tracker = RateTracker::new().with_interval("console", "post", Duration::from_secs(60));
        tracker.record("console", "post", noon());
        let set = candidate_set(
            &profile,
            &registry(&["post"]),
            &tracker,
            noon() + chrono::Duration::seconds(20),
        );
        assert!(set.is_empty());
        assert_eq!(
            set.excluded[0].1,
            Exclusion::CoolingDown { remaining_secs: 40 }
        );
    }

    #[test]
    fn test_time_multiplier_applies() {
        let mut profile = AgentProfile {
            tasks: vec![TaskConfig::new("post", 2.0)],
            use_time_based_weights: true,
            utc_offset_hours: Some(0),
            config: vec![ConnectionSettings::new("console")],
            ..Default::default()
        };
        profile.time_based_multipliers.insert("day".into(), 1.5);
        let set = candidate_set(&profile, &registry(&["post"]), &RateTracker::new(), noon());
        assert_eq!(set.period.as_deref(), Some("day"));
        assert_eq!(set.candidates[0].weight, 3.0);
    }

    #[test]
    fn test_zero_multiplier_excludes_everything() {
        let mut profile = AgentProfile {
            tasks: vec![TaskConfig::new("post", 2.0)],
            use_time_based_weights: true,
            utc_offset_hours: Some(0),
            ..Default::default()
        };
        profile.time_based_multipliers.insert("day".into(), 0.0);
        let set = candidate_set(&profile, &registry(&["post"]), &RateTracker::new(), noon());
        assert!(set.is_empty());
    }

    #[test]
    fn test_multiplier_ignored_when_disabled() {
        let mut profile = AgentProfile {
            tasks: vec![TaskConfig::new("post", 2.0)],
            utc_offset_hours: Some(0),
            ..Default::default()
        };
        profile.time_based_multipliers.insert("day".into(), 0.0);
        let set = candidate_set(&profile, &registry(&["post"]), &RateTracker::new(), noon());
        assert_eq!(set.period, None);
        assert_eq!(set.candidates[0].weight, 2.0);
    }

    #[test]
    fn test_current_period_uses_offset() {
        let profile = AgentProfile {
            utc_offset_hours: Some(-9),
            ..Default::default()
        };
        // 12:00 UTC is 03:00 at UTC-9
        assert_eq!(current_period(&profile, noon()).as_deref(), Some("night"));

        let profile = AgentProfile {
            utc_offset_hours: Some(9),
            ..Default::default()
        };
        // 21:00 falls in no default period
        assert_eq!(current_period(&profile, noon()), None);
    }

    #[test]
    fn test_current_period_first_match_wins() {
        let profile = AgentProfile {
            utc_offset_hours: Some(0),
            time_periods: vec![
                TimePeriod::new("lunch", 12, 13),
                TimePeriod::new("day", 8, 20),
            ],
            ..Default::default()
        };
        assert_eq!(current_period(&profile, noon()).as_deref(), Some("lunch"));
    }
}
