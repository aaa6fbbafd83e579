//! Efficiency scoring: accuracy scaled by how quickly answers come relative
//! to a per-difficulty reference time.
//!
//! `score = 100 * accuracy_rate * clamp(target_time / avg_time, min, max)`,
//! clamped to 0..=100.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{EfficiencyConfig, EngineConfig};
use crate::model::{AttemptEvent, DataStatus};
use crate::statistics::weighted_mean;

/// Running totals for a group of attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttemptTally {
    pub attempts: usize,
    pub correct: usize,
    pub study_seconds: f64,
    pub target_seconds: f64,
}

impl AttemptTally {
    pub fn add(&mut self, event: &AttemptEvent, config: &EfficiencyConfig) {
        self.attempts += 1;
        if event.is_correct {
            self.correct += 1;
        }
        self.study_seconds += event.duration();
        self.target_seconds += config.target_for(event.tier());
    }

    pub fn from_events<'a>(
        events: impl IntoIterator<Item = &'a AttemptEvent>,
        config: &EfficiencyConfig,
    ) -> Self {
        let mut tally = Self::default();
        for event in events {
            tally.add(event, config);
        }
        tally
    }

    /// Fraction of correct attempts, 0..=1.
    pub fn accuracy_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }

    pub fn avg_time(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.study_seconds / self.attempts as f64
        }
    }

    /// Attempt-weighted mean of the per-tier reference times.
    pub fn avg_target(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.target_seconds / self.attempts as f64
        }
    }

    pub fn speed_factor(&self, config: &EfficiencyConfig) -> f64 {
        let avg = self.avg_time();
        if avg <= 0.0 {
            return config.max_speed_factor;
        }
        (self.avg_target() / avg).clamp(config.min_speed_factor, config.max_speed_factor)
    }

    /// Efficiency score on a 0..=100 scale.
    pub fn score(&self, config: &EfficiencyConfig) -> f64 {
        (100.0 * self.accuracy_rate() * self.speed_factor(config)).clamp(0.0, 100.0)
    }

    fn to_metrics(self, config: &EfficiencyConfig) -> EfficiencyMetrics {
        EfficiencyMetrics {
            attempts: self.attempts,
            correct: self.correct,
            accuracy: 100.0 * self.accuracy_rate(),
            avg_time_seconds: self.avg_time(),
            target_time_seconds: self.avg_target(),
            speed_factor: self.speed_factor(config),
            study_seconds: self.study_seconds,
            score: self.score(config),
        }
    }
}

/// Efficiency figures for one group of attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub attempts: usize,
    pub correct: usize,
    /// Percentage of correct attempts.
    pub accuracy: f64,
    pub avg_time_seconds: f64,
    pub target_time_seconds: f64,
    pub speed_factor: f64,
    pub study_seconds: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEfficiency {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: EfficiencyMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEfficiency {
    pub knowledge_unit_id: String,
    #[serde(flatten)]
    pub metrics: EfficiencyMetrics,
}

/// Efficiency over the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub data_status: DataStatus,
    /// One entry per calendar day with attempts, oldest first.
    pub daily: Vec<DailyEfficiency>,
    /// One entry per knowledge unit, ordered by id.
    pub per_unit: Vec<UnitEfficiency>,
    /// Study-time-weighted mean of the daily scores.
    pub aggregate_score: Option<f64>,
    /// Window-wide accuracy percentage.
    pub overall_accuracy: Option<f64>,
    /// Window-wide speed factor.
    pub overall_speed_factor: Option<f64>,
    pub recommendations: Vec<String>,
}

/// Score the window per day and per knowledge unit.
pub fn analyze(events: &[AttemptEvent], config: &EngineConfig) -> EfficiencyReport {
    let eff = &config.efficiency;

    let mut by_day: BTreeMap<NaiveDate, AttemptTally> = BTreeMap::new();
    let mut by_unit: BTreeMap<&str, AttemptTally> = BTreeMap::new();
    for event in events {
        let day = config.localize(event.occurred_at).date_naive();
        by_day.entry(day).or_default().add(event, eff);
        by_unit
            .entry(event.knowledge_unit_id.as_str())
            .or_default()
            .add(event, eff);
    }

    let daily: Vec<DailyEfficiency> = by_day
        .into_iter()
        .map(|(date, tally)| DailyEfficiency {
            date,
            metrics: tally.to_metrics(eff),
        })
        .collect();

    let per_unit = by_unit
        .into_iter()
        .map(|(unit, tally)| UnitEfficiency {
            knowledge_unit_id: unit.to_string(),
            metrics: tally.to_metrics(eff),
        })
        .collect();

    let aggregate_score = aggregate(&daily);
    let overall = AttemptTally::from_events(events, eff);
    let (overall_accuracy, overall_speed_factor) = if overall.attempts > 0 {
        (
            Some(100.0 * overall.accuracy_rate()),
            Some(overall.speed_factor(eff)),
        )
    } else {
        (None, None)
    };

    let recommendations = match (aggregate_score, overall_accuracy, overall_speed_factor) {
        (Some(score), Some(accuracy), Some(speed)) => recommend(score, accuracy, speed),
        _ => Vec::new(),
    };

    EfficiencyReport {
        data_status: DataStatus::check(1, events.len()),
        daily,
        per_unit,
        aggregate_score,
        overall_accuracy,
        overall_speed_factor,
        recommendations,
    }
}

/// Mean of daily scores weighted by study time, falling back to attempt
/// counts when no time was recorded.
pub fn aggregate(daily: &[DailyEfficiency]) -> Option<f64> {
    weighted_mean(
        daily
            .iter()
            .map(|d| (d.metrics.score, d.metrics.study_seconds)),
    )
    .or_else(|| {
        weighted_mean(
            daily
                .iter()
                .map(|d| (d.metrics.score, d.metrics.attempts as f64)),
        )
    })
}

/// Threshold-based advice, in a fixed order.
pub fn recommend(score: f64, accuracy: f64, speed_factor: f64) -> Vec<String> {
    let mut out = Vec::new();
    if score < 50.0 {
        out.push("review fundamentals before increasing pace".to_string());
    }
    if accuracy >= 80.0 && speed_factor < 0.8 {
        out.push("accuracy is solid; add timed practice to build fluency".to_string());
    }
    if speed_factor >= 1.2 && accuracy < 60.0 {
        out.push("slow down: fast answers are costing accuracy".to_string());
    }
    if score >= 80.0 {
        out.push("efficiency is strong; consider raising difficulty".to_string());
    }
    out
}
