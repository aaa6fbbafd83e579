//! Engine configuration.
//!
//! Every value has a documented default so an empty TOML table yields a
//! working engine. Configuration is fixed at engine construction.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MAX_DIFFICULTY_TIER, MIN_DIFFICULTY_TIER};

/// Longest analysis window a report accepts, in days.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Longest forecast horizon a report accepts, in days.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analysis window used when the caller does not pass one.
    pub default_window_days: u32,
    /// Forecast horizon used when the caller does not pass one.
    pub default_horizon_days: u32,
    /// Offset applied before bucketing by day, hour, and weekday.
    pub utc_offset_minutes: i32,
    /// Deadline for every accessor call.
    pub accessor_timeout_ms: u64,
    pub mastery: MasteryConfig,
    pub efficiency: EfficiencyConfig,
    pub temporal: TemporalConfig,
    pub difficulty: DifficultyConfig,
    pub behavior: BehaviorConfig,
    pub forecast: ForecastConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_days: 30,
            default_horizon_days: 7,
            utc_offset_minutes: 0,
            accessor_timeout_ms: 5_000,
            mastery: MasteryConfig::default(),
            efficiency: EfficiencyConfig::default(),
            temporal: TemporalConfig::default(),
            difficulty: DifficultyConfig::default(),
            behavior: BehaviorConfig::default(),
            forecast: ForecastConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryConfig {
    /// Recency decay applied per step back in time.
    pub decay: f64,
    /// Below this sample size a unit cannot be labeled mastered.
    pub min_samples: usize,
    /// Scores below this are weak.
    pub weak_below: f64,
    /// Scores above this (with enough samples) are mastered.
    pub mastered_above: f64,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            decay: 0.9,
            min_samples: 3,
            weak_below: 40.0,
            mastered_above: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    /// Reference seconds per attempt for difficulty tiers 1..=5.
    pub target_seconds: [f64; 5],
    pub min_speed_factor: f64,
    pub max_speed_factor: f64,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            target_seconds: [20.0, 30.0, 45.0, 60.0, 90.0],
            min_speed_factor: 0.5,
            max_speed_factor: 1.5,
        }
    }
}

impl EfficiencyConfig {
    /// Target time for a difficulty tier; out-of-range tiers are clamped.
    pub fn target_for(&self, tier: u8) -> f64 {
        let tier = tier.clamp(MIN_DIFFICULTY_TIER, MAX_DIFFICULTY_TIER);
        self.target_seconds[(tier - MIN_DIFFICULTY_TIER) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// A gap longer than this starts a new session.
    pub session_break_minutes: u32,
    /// Hour buckets need this many attempts to be ranked.
    pub min_hour_samples: usize,
    /// How many ranked hours to report.
    pub peak_hours_limit: usize,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            session_break_minutes: 30,
            min_hour_samples: 5,
            peak_hours_limit: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Productive-struggle accuracy the adapter aims for.
    pub target_accuracy: f64,
    pub increase_at: f64,
    pub decrease_below: f64,
    pub min_attempts: usize,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            target_accuracy: 75.0,
            increase_at: 85.0,
            decrease_below: 50.0,
            min_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Mean gap (days) below which the learner studies daily.
    pub daily_gap_days: f64,
    /// Consistency at or above which the pattern is regular.
    pub regular_consistency: f64,
    /// Relative slope below which intensity is stable.
    pub stable_slope_ratio: f64,
    /// Expected days between sessions for the habit score.
    pub expected_gap_days: f64,
    pub consistency_weight: f64,
    pub cadence_weight: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            daily_gap_days: 1.5,
            regular_consistency: 0.6,
            stable_slope_ratio: 0.05,
            expected_gap_days: 1.0,
            consistency_weight: 0.6,
            cadence_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub min_points: usize,
    /// Relative slope separating improving/declining from stable.
    pub trend_threshold: f64,
    /// Sample size at which the sample component of confidence saturates.
    pub full_confidence_points: usize,
    pub risk_confidence: f64,
    pub risk_accuracy: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: 5,
            trend_threshold: 0.05,
            full_confidence_points: 20,
            risk_confidence: 0.5,
            risk_accuracy: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Review intervals in days, indexed by stage.
    pub interval_ladder: Vec<f64>,
    /// Consecutive correct reviews needed to promote one stage.
    pub promotion_streak: u32,
    /// Stages lost on a lapse.
    pub lapse_penalty_stages: usize,
    /// Consecutive correct reviews at the top stage that retire a card.
    pub retire_streak: u32,
    pub initial_ease: f64,
    pub ease_bonus: f64,
    pub ease_penalty: f64,
    pub min_ease: f64,
    pub max_ease: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ladder: vec![1.0, 2.0, 4.0, 7.0, 15.0, 30.0, 60.0],
            promotion_streak: 2,
            lapse_penalty_stages: 2,
            retire_streak: 3,
            initial_ease: 1.0,
            ease_bonus: 0.05,
            ease_penalty: 0.2,
            min_ease: 0.3,
            max_ease: 2.5,
        }
    }
}

impl SchedulerConfig {
    /// Highest valid stage index.
    pub fn top_stage(&self) -> usize {
        self.interval_ladder.len().saturating_sub(1)
    }

    /// Longest interval on the ladder, in days.
    pub fn max_interval_days(&self) -> f64 {
        self.interval_ladder.last().copied().unwrap_or(1.0)
    }
}

/// A non-fatal configuration problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse engine config")
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid engine config: {}", path.display()))
    }

    /// Fixed offset used for calendar bucketing.
    pub fn offset(&self) -> FixedOffset {
        self.checked_offset().unwrap_or_else(|| Utc.fix())
    }

    fn checked_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Convert a UTC timestamp into the configured local offset.
    pub fn localize(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.offset())
    }

    pub fn accessor_timeout(&self) -> Duration {
        Duration::from_millis(self.accessor_timeout_ms)
    }

    /// Check the configuration for suspicious values.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.checked_offset().is_none() {
            warnings.push(ConfigWarning::new(
                "utc_offset_minutes",
                "offset out of range, UTC will be used",
            ));
        }
        if self.default_window_days > MAX_WINDOW_DAYS {
            warnings.push(ConfigWarning::new(
                "default_window_days",
                format!("reports reject windows over {MAX_WINDOW_DAYS} days"),
            ));
        }
        if self.default_horizon_days > MAX_HORIZON_DAYS {
            warnings.push(ConfigWarning::new(
                "default_horizon_days",
                format!("reports reject horizons over {MAX_HORIZON_DAYS} days"),
            ));
        }
        if self.accessor_timeout_ms == 0 {
            warnings.push(ConfigWarning::new(
                "accessor_timeout_ms",
                "a zero timeout fails every accessor call",
            ));
        }
        if !(self.mastery.decay > 0.0 && self.mastery.decay <= 1.0) {
            warnings.push(ConfigWarning::new(
                "mastery.decay",
                format!("decay {} is outside (0, 1]", self.mastery.decay),
            ));
        }
        if self.mastery.weak_below > self.mastery.mastered_above {
            warnings.push(ConfigWarning::new(
                "mastery.weak_below",
                "weak breakpoint is above the mastered breakpoint",
            ));
        }
        if self.efficiency.target_seconds.iter().any(|t| *t <= 0.0) {
            warnings.push(ConfigWarning::new(
                "efficiency.target_seconds",
                "target times must be positive",
            ));
        }
        if self.efficiency.min_speed_factor > self.efficiency.max_speed_factor {
            warnings.push(ConfigWarning::new(
                "efficiency.min_speed_factor",
                "min speed factor exceeds max speed factor",
            ));
        }
        if self.temporal.session_break_minutes == 0 {
            warnings.push(ConfigWarning::new(
                "temporal.session_break_minutes",
                "every attempt will form its own session",
            ));
        }
        if self.difficulty.decrease_below >= self.difficulty.increase_at {
            warnings.push(ConfigWarning::new(
                "difficulty.decrease_below",
                "decrease threshold is not below the increase threshold",
            ));
        }
        if self.forecast.min_points < 2 {
            warnings.push(ConfigWarning::new(
                "forecast.min_points",
                "a regression needs at least two points",
            ));
        }

        let ladder = &self.scheduler.interval_ladder;
        if ladder.is_empty() {
            warnings.push(ConfigWarning::new(
                "scheduler.interval_ladder",
                "interval ladder is empty",
            ));
        } else if ladder.windows(2).any(|w| w[0] > w[1]) {
            warnings.push(ConfigWarning::new(
                "scheduler.interval_ladder",
                "interval ladder is not ascending",
            ));
        }
        if ladder.iter().any(|d| *d <= 0.0) {
            warnings.push(ConfigWarning::new(
                "scheduler.interval_ladder",
                "ladder intervals must be positive",
            ));
        }
        if self.scheduler.promotion_streak == 0 {
            warnings.push(ConfigWarning::new(
                "scheduler.promotion_streak",
                "promotion streak of zero promotes on every review",
            ));
        }
        if self.scheduler.min_ease > self.scheduler.max_ease {
            warnings.push(ConfigWarning::new(
                "scheduler.min_ease",
                "min ease exceeds max ease",
            ));
        }
        if self.scheduler.initial_ease < self.scheduler.min_ease
            || self.scheduler.initial_ease > self.scheduler.max_ease
        {
            warnings.push(ConfigWarning::new(
                "scheduler.initial_ease",
                "initial ease is outside [min_ease, max_ease]",
            ));
        }

        warnings
    }
}
