//! Mastery estimation with exponential recency weighting.
//!
//! The most recent attempt has weight 1, the one before it `decay`, then
//! `decay^2`, and so on. Small samples are never labeled mastered.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MasteryConfig;
use crate::model::{AttemptEvent, DataStatus, MasteryTier};

/// Mastery estimate for one knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterySnapshot {
    pub knowledge_unit_id: String,
    /// Recency-weighted correctness 0..=100; `None` without attempts.
    pub mastery_score: Option<f64>,
    pub tier: MasteryTier,
    pub sample_size: usize,
    /// Time of the latest attempt contributing to the estimate.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Mastery across all knowledge units in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryReport {
    pub data_status: DataStatus,
    /// One snapshot per knowledge unit, ordered by id.
    pub units: Vec<MasterySnapshot>,
    /// Number of units in each tier.
    pub tier_counts: BTreeMap<MasteryTier, usize>,
    /// Weak units, weakest first.
    pub focus_units: Vec<String>,
}

/// Recency-weighted score over attempts ordered oldest to newest.
pub fn weighted_score(attempts: &[&AttemptEvent], decay: f64) -> Option<f64> {
    if attempts.is_empty() {
        return None;
    }
    let mut weight = 1.0;
    let mut num = 0.0;
    let mut den = 0.0;
    for event in attempts.iter().rev() {
        if event.is_correct {
            num += weight;
        }
        den += weight;
        weight *= decay;
    }
    if den > 0.0 {
        Some(100.0 * num / den)
    } else {
        None
    }
}

/// Tier for a score and sample size.
pub fn classify(score: Option<f64>, sample_size: usize, config: &MasteryConfig) -> MasteryTier {
    let Some(score) = score else {
        return MasteryTier::Unknown;
    };
    if sample_size == 0 {
        return MasteryTier::Unknown;
    }
    if score < config.weak_below {
        MasteryTier::Weak
    } else if score <= config.mastered_above || sample_size < config.min_samples {
        MasteryTier::Developing
    } else {
        MasteryTier::Mastered
    }
}

/// Estimate mastery for one knowledge unit from its attempts, oldest first.
pub fn estimate(
    knowledge_unit_id: &str,
    attempts: &[&AttemptEvent],
    config: &MasteryConfig,
) -> MasterySnapshot {
    let score = weighted_score(attempts, config.decay);
    MasterySnapshot {
        knowledge_unit_id: knowledge_unit_id.to_string(),
        mastery_score: score,
        tier: classify(score, attempts.len(), config),
        sample_size: attempts.len(),
        last_updated: attempts.last().map(|e| e.occurred_at),
    }
}

/// Estimate mastery for every unit in `events`, plus `extra_units` that may
/// have no attempts in the window.
pub fn estimate_all<'a>(
    events: &[AttemptEvent],
    extra_units: impl IntoIterator<Item = &'a str>,
    config: &MasteryConfig,
) -> MasteryReport {
    let mut grouped: BTreeMap<&str, Vec<&AttemptEvent>> = BTreeMap::new();
    for event in events {
        grouped
            .entry(event.knowledge_unit_id.as_str())
            .or_default()
            .push(event);
    }
    let extra: BTreeSet<&str> = extra_units.into_iter().collect();
    for unit in extra {
        grouped.entry(unit).or_default();
    }

    let units: Vec<MasterySnapshot> = grouped
        .iter()
        .map(|(unit, attempts)| estimate(unit, attempts, config))
        .collect();

    let mut tier_counts = BTreeMap::new();
    for snapshot in &units {
        *tier_counts.entry(snapshot.tier).or_insert(0) += 1;
    }

    let mut weak: Vec<&MasterySnapshot> = units
        .iter()
        .filter(|s| s.tier == MasteryTier::Weak)
        .collect();
    weak.sort_by(|a, b| {
        let sa = a.mastery_score.unwrap_or(0.0);
        let sb = b.mastery_score.unwrap_or(0.0);
        sa.total_cmp(&sb)
            .then_with(|| a.knowledge_unit_id.cmp(&b.knowledge_unit_id))
    });
    let focus_units = weak.iter().map(|s| s.knowledge_unit_id.clone()).collect();

    MasteryReport {
        data_status: DataStatus::check(1, events.len()),
        units,
        tier_counts,
        focus_units,
    }
}

impl MasteryReport {
    /// Snapshot for a single knowledge unit.
    pub fn unit(&self, knowledge_unit_id: &str) -> Option<&MasterySnapshot> {
        self.units
            .iter()
            .find(|s| s.knowledge_unit_id == knowledge_unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn attempt(unit: &str, correct: bool, minute: i64) -> AttemptEvent {
        AttemptEvent {
            learner_id: "l1".into(),
            knowledge_unit_id: unit.into(),
            subject_id: "math".into(),
            is_correct: correct,
            difficulty_tier: 2,
            duration_seconds: 30.0,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    fn refs(events: &[AttemptEvent]) -> Vec<&AttemptEvent> {
        events.iter().collect()
    }

    #[test]
    fn no_attempts_is_unknown_without_score() {
        let snapshot = estimate("ku1", &[], &MasteryConfig::default());
        assert_eq!(snapshot.tier, MasteryTier::Unknown);
        assert_eq!(snapshot.mastery_score, None);
        assert_eq!(snapshot.sample_size, 0);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["mastery_score"].is_null());
    }

    #[test]
    fn two_correct_attempts_cap_at_developing() {
        let events = vec![attempt("ku1", true, 0), attempt("ku1", true, 5)];
        let snapshot = estimate("ku1", &refs(&events), &MasteryConfig::default());
        assert_eq!(snapshot.mastery_score, Some(100.0));
        assert_eq!(snapshot.tier, MasteryTier::Developing);
    }

    #[test]
    fn three_correct_attempts_are_mastered() {
        let events: Vec<_> = (0..3).map(|i| attempt("ku1", true, i)).collect();
        let snapshot = estimate("ku1", &refs(&events), &MasteryConfig::default());
        assert_eq!(snapshot.tier, MasteryTier::Mastered);
    }

    #[test]
    fn recent_attempts_weigh_more() {
        // Old failure, recent success vs. old success, recent failure.
        let improving = vec![attempt("ku1", false, 0), attempt("ku1", true, 1)];
        let slipping = vec![attempt("ku1", true, 0), attempt("ku1", false, 1)];
        let a = weighted_score(&refs(&improving), 0.9).unwrap();
        let b = weighted_score(&refs(&slipping), 0.9).unwrap();
        // 1 / 1.9 and 0.9 / 1.9
        assert!((a - 100.0 / 1.9).abs() < 1e-9);
        assert!((b - 90.0 / 1.9).abs() < 1e-9);
        assert!(a > b);
    }

    #[test]
    fn tier_breakpoints() {
        let config = MasteryConfig::default();
        assert_eq!(classify(Some(39.9), 10, &config), MasteryTier::Weak);
        assert_eq!(classify(Some(40.0), 10, &config), MasteryTier::Developing);
        assert_eq!(classify(Some(75.0), 10, &config), MasteryTier::Developing);
        assert_eq!(classify(Some(75.1), 10, &config), MasteryTier::Mastered);
        assert_eq!(classify(Some(10.0), 1, &config), MasteryTier::Weak);
    }

    #[test]
    fn estimate_all_includes_units_without_attempts() {
        let events = vec![
            attempt("b", false, 0),
            attempt("a", true, 1),
            attempt("b", false, 2),
        ];
        let report = estimate_all(&events, ["c"], &MasteryConfig::default());
        let ids: Vec<_> = report
            .units
            .iter()
            .map(|s| s.knowledge_unit_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.unit("c").unwrap().tier, MasteryTier::Unknown);
        assert_eq!(report.unit("b").unwrap().tier, MasteryTier::Weak);
        assert_eq!(report.focus_units, vec!["b".to_string()]);
        assert_eq!(report.tier_counts.get(&MasteryTier::Unknown), Some(&1));
        assert!(report.data_status.is_sufficient());
    }
}
