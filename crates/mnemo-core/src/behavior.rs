//! Behavior classification from session history.
//!
//! Frequency comes from the spacing of session starts, intensity from the
//! trend of session length, and the learning style is a fixed lookup over
//! the two.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BehaviorConfig;
use crate::model::DataStatus;
use crate::statistics::{linear_regression, mean, std_dev};
use crate::temporal::SessionWindow;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyPattern {
    Daily,
    Regular,
    Irregular,
}

impl fmt::Display for FrequencyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyPattern::Daily => write!(f, "daily"),
            FrequencyPattern::Regular => write!(f, "regular"),
            FrequencyPattern::Irregular => write!(f, "irregular"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityPattern {
    Increasing,
    Stable,
    Decreasing,
}

impl fmt::Display for IntensityPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntensityPattern::Increasing => write!(f, "increasing"),
            IntensityPattern::Stable => write!(f, "stable"),
            IntensityPattern::Decreasing => write!(f, "decreasing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Sprinter,
    Marathoner,
    Inconsistent,
    Balanced,
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningStyle::Sprinter => write!(f, "sprinter"),
            LearningStyle::Marathoner => write!(f, "marathoner"),
            LearningStyle::Inconsistent => write!(f, "inconsistent"),
            LearningStyle::Balanced => write!(f, "balanced"),
        }
    }
}

impl LearningStyle {
    /// Fixed mapping from (frequency, intensity) to a style label.
    pub fn from_patterns(frequency: FrequencyPattern, intensity: IntensityPattern) -> Self {
        use FrequencyPattern::*;
        use IntensityPattern::*;
        match (frequency, intensity) {
            (Daily, Increasing) => LearningStyle::Marathoner,
            (Daily, Stable) => LearningStyle::Balanced,
            (Daily, Decreasing) => LearningStyle::Balanced,
            (Regular, Increasing) => LearningStyle::Marathoner,
            (Regular, Stable) => LearningStyle::Balanced,
            (Regular, Decreasing) => LearningStyle::Sprinter,
            (Irregular, Increasing) => LearningStyle::Sprinter,
            (Irregular, Stable) => LearningStyle::Inconsistent,
            (Irregular, Decreasing) => LearningStyle::Inconsistent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyProfile {
    pub pattern: FrequencyPattern,
    /// Days between consecutive session starts.
    pub gaps_days: Vec<f64>,
    pub mean_gap_days: f64,
    /// `1 - stdev / mean`, clamped to 0..=1.
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityProfile {
    pub pattern: IntensityPattern,
    /// Mean session length in minutes.
    pub average_intensity: f64,
    /// Change in session length per session, in minutes.
    pub slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorReport {
    pub data_status: DataStatus,
    pub session_count: usize,
    pub frequency: Option<FrequencyProfile>,
    pub intensity: Option<IntensityProfile>,
    /// 0..=100.
    pub habit_score: Option<f64>,
    pub learning_style: Option<LearningStyle>,
}

/// Consistency of a gap sequence.
pub fn consistency(gaps: &[f64]) -> f64 {
    match (mean(gaps), std_dev(gaps)) {
        (Some(m), Some(sd)) if m > 0.0 => (1.0 - sd / m).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

pub fn classify_frequency(
    sessions: &[SessionWindow],
    config: &BehaviorConfig,
) -> Option<FrequencyProfile> {
    if sessions.len() < 2 {
        return None;
    }
    let gaps_days: Vec<f64> = sessions
        .windows(2)
        .map(|w| (w[1].started_at - w[0].started_at).num_seconds() as f64 / SECONDS_PER_DAY)
        .collect();
    let mean_gap_days = mean(&gaps_days)?;
    let consistency = consistency(&gaps_days);

    let pattern = if mean_gap_days < config.daily_gap_days {
        FrequencyPattern::Daily
    } else if consistency >= config.regular_consistency {
        FrequencyPattern::Regular
    } else {
        FrequencyPattern::Irregular
    };

    Some(FrequencyProfile {
        pattern,
        gaps_days,
        mean_gap_days,
        consistency,
    })
}

pub fn classify_intensity(
    sessions: &[SessionWindow],
    config: &BehaviorConfig,
) -> Option<IntensityProfile> {
    let points: Vec<(f64, f64)> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.length_minutes))
        .collect();
    let fit = linear_regression(&points)?;
    let average_intensity = fit.mean_y;

    let relative = fit.relative_slope();
    let pattern = if relative.abs() < config.stable_slope_ratio {
        IntensityPattern::Stable
    } else if relative > 0.0 {
        IntensityPattern::Increasing
    } else {
        IntensityPattern::Decreasing
    };

    Some(IntensityProfile {
        pattern,
        average_intensity,
        slope: fit.slope,
    })
}

/// Habit score from consistency and session count against the expected cadence.
pub fn habit_score(
    consistency: f64,
    session_count: usize,
    window_days: u32,
    config: &BehaviorConfig,
) -> f64 {
    let expected = if config.expected_gap_days > 0.0 {
        (f64::from(window_days) / config.expected_gap_days).max(1.0)
    } else {
        1.0
    };
    let cadence = (session_count as f64 / expected).min(1.0);
    (100.0 * (config.consistency_weight * consistency + config.cadence_weight * cadence))
        .clamp(0.0, 100.0)
}

pub fn analyze(
    sessions: &[SessionWindow],
    window_days: u32,
    config: &BehaviorConfig,
) -> BehaviorReport {
    let frequency = classify_frequency(sessions, config);
    let intensity = classify_intensity(sessions, config);

    let habit = frequency
        .as_ref()
        .map(|f| habit_score(f.consistency, sessions.len(), window_days, config));
    let learning_style = match (&frequency, &intensity) {
        (Some(f), Some(i)) => Some(LearningStyle::from_patterns(f.pattern, i.pattern)),
        _ => None,
    };

    BehaviorReport {
        data_status: DataStatus::check(2, sessions.len()),
        session_count: sessions.len(),
        frequency,
        intensity,
        habit_score: habit,
        learning_style,
    }
}
