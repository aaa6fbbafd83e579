//! Difficulty adaptation around a productive-struggle accuracy target.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DifficultyConfig;
use crate::model::{AttemptEvent, DataStatus, MAX_DIFFICULTY_TIER, MIN_DIFFICULTY_TIER};
use crate::statistics::accuracy_percent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierRecommendation {
    Increase,
    Hold,
    Decrease,
}

impl fmt::Display for TierRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierRecommendation::Increase => write!(f, "increase"),
            TierRecommendation::Hold => write!(f, "hold"),
            TierRecommendation::Decrease => write!(f, "decrease"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeReadiness {
    Ready,
    Stable,
    NeedsSupport,
}

impl fmt::Display for ChallengeReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeReadiness::Ready => write!(f, "ready"),
            ChallengeReadiness::Stable => write!(f, "stable"),
            ChallengeReadiness::NeedsSupport => write!(f, "needs_support"),
        }
    }
}

impl From<TierRecommendation> for ChallengeReadiness {
    fn from(rec: TierRecommendation) -> Self {
        match rec {
            TierRecommendation::Increase => ChallengeReadiness::Ready,
            TierRecommendation::Hold => ChallengeReadiness::Stable,
            TierRecommendation::Decrease => ChallengeReadiness::NeedsSupport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub tier: u8,
    pub attempts: usize,
    pub correct: usize,
    pub accuracy: f64,
    /// `100 - |target - accuracy|`.
    pub adaptation_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyReport {
    pub data_status: DataStatus,
    /// Stats for every tier with attempts, easiest first.
    pub tiers: Vec<TierStats>,
    /// Adaptation score on window-wide accuracy.
    pub overall_adaptation_score: Option<f64>,
    /// Tier of the most recent attempt.
    pub current_tier: Option<u8>,
    pub recommendation: TierRecommendation,
    pub next_tier: Option<u8>,
    pub readiness: ChallengeReadiness,
}

pub fn adaptation_score(target_accuracy: f64, observed_accuracy: f64) -> f64 {
    100.0 - (target_accuracy - observed_accuracy).abs()
}

/// Recommendation from the current tier's stats.
pub fn recommend(stats: Option<&TierStats>, config: &DifficultyConfig) -> TierRecommendation {
    match stats {
        Some(s) if s.attempts >= config.min_attempts && s.accuracy >= config.increase_at => {
            TierRecommendation::Increase
        }
        Some(s) if s.attempts >= config.min_attempts && s.accuracy < config.decrease_below => {
            TierRecommendation::Decrease
        }
        _ => TierRecommendation::Hold,
    }
}

/// Apply a recommendation to a tier, staying within the valid range.
pub fn next_tier(current: u8, recommendation: TierRecommendation) -> u8 {
    let next = match recommendation {
        TierRecommendation::Increase => current.saturating_add(1),
        TierRecommendation::Hold => current,
        TierRecommendation::Decrease => current.saturating_sub(1),
    };
    next.clamp(MIN_DIFFICULTY_TIER, MAX_DIFFICULTY_TIER)
}

pub fn analyze(events: &[AttemptEvent], config: &DifficultyConfig) -> DifficultyReport {
    let mut counts: BTreeMap<u8, (usize, usize)> = BTreeMap::new();
    for event in events {
        let entry = counts.entry(event.tier()).or_insert((0, 0));
        entry.0 += 1;
        if event.is_correct {
            entry.1 += 1;
        }
    }

    let tiers: Vec<TierStats> = counts
        .into_iter()
        .filter_map(|(tier, (attempts, correct))| {
            let accuracy = accuracy_percent(correct, attempts)?;
            Some(TierStats {
                tier,
                attempts,
                correct,
                accuracy,
                adaptation_score: adaptation_score(config.target_accuracy, accuracy),
            })
        })
        .collect();

    let total_correct = events.iter().filter(|e| e.is_correct).count();
    let overall_adaptation_score = accuracy_percent(total_correct, events.len())
        .map(|acc| adaptation_score(config.target_accuracy, acc));

    let current_tier = events.last().map(AttemptEvent::tier);
    let current_stats = current_tier.and_then(|t| tiers.iter().find(|s| s.tier == t));
    let recommendation = recommend(current_stats, config);

    DifficultyReport {
        data_status: DataStatus::check(config.min_attempts, current_stats.map_or(0, |s| s.attempts)),
        tiers,
        overall_adaptation_score,
        current_tier,
        recommendation,
        next_tier: current_tier.map(|t| next_tier(t, recommendation)),
        readiness: recommendation.into(),
    }
}
