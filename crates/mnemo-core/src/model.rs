//! Core data model types for mnemo.
//!
//! Attempt events are produced by the host application and consumed
//! read-only. Memory cards are the only entity with a lifecycle and are
//! owned by the scheduler.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest difficulty tier.
pub const MIN_DIFFICULTY_TIER: u8 = 1;
/// Highest difficulty tier.
pub const MAX_DIFFICULTY_TIER: u8 = 5;

/// A single recorded attempt on a knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptEvent {
    /// Learner who made the attempt.
    pub learner_id: String,
    /// Knowledge unit that was attempted.
    pub knowledge_unit_id: String,
    /// Subject the knowledge unit belongs to.
    #[serde(default)]
    pub subject_id: String,
    /// Whether the answer was correct.
    pub is_correct: bool,
    /// Difficulty tier, 1 (easiest) to 5.
    pub difficulty_tier: u8,
    /// Time spent on the attempt in seconds.
    pub duration_seconds: f64,
    /// When the attempt was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl AttemptEvent {
    /// Difficulty tier clamped into the valid range.
    pub fn tier(&self) -> u8 {
        self.difficulty_tier
            .clamp(MIN_DIFFICULTY_TIER, MAX_DIFFICULTY_TIER)
    }

    /// Duration with negative or non-finite values treated as zero.
    pub fn duration(&self) -> f64 {
        if self.duration_seconds.is_finite() {
            self.duration_seconds.max(0.0)
        } else {
            0.0
        }
    }

    /// Composite scheduler key for this attempt.
    pub fn card_key(&self) -> CardKey {
        CardKey::new(&self.learner_id, &self.knowledge_unit_id)
    }
}

/// Composite (learner, knowledge unit) identifier for a memory card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardKey {
    pub learner_id: String,
    pub knowledge_unit_id: String,
}

impl CardKey {
    pub fn new(learner_id: &str, knowledge_unit_id: &str) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            knowledge_unit_id: knowledge_unit_id.to_string(),
        }
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.learner_id, self.knowledge_unit_id)
    }
}

/// Persistent review state for one (learner, knowledge unit) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryCardState {
    pub learner_id: String,
    pub knowledge_unit_id: String,
    /// Index into the interval ladder.
    pub stage: usize,
    /// Multiplier applied to the ladder interval.
    pub ease_factor: f64,
    /// When the next review is due.
    pub next_due_at: DateTime<Utc>,
    /// Correct reviews in a row since the last promotion or lapse.
    pub consecutive_correct: u32,
    /// Incorrect reviews over the card's lifetime.
    pub lapses: u32,
    /// When the card was created (first attempt).
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last attempt applied to the card.
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// Attempts applied to the card, including the first one.
    #[serde(default)]
    pub review_count: u32,
    /// Retired cards are no longer scheduled until reset.
    #[serde(default)]
    pub retired: bool,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl MemoryCardState {
    /// A fresh card: stage 0, neutral ease, due immediately.
    pub fn new(learner_id: &str, knowledge_unit_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            knowledge_unit_id: knowledge_unit_id.to_string(),
            stage: 0,
            ease_factor: 1.0,
            next_due_at: now,
            consecutive_correct: 0,
            lapses: 0,
            created_at: now,
            last_reviewed_at: None,
            review_count: 0,
            retired: false,
        }
    }

    pub fn key(&self) -> CardKey {
        CardKey::new(&self.learner_id, &self.knowledge_unit_id)
    }

    /// True when the card is scheduled and its due date has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.retired && self.next_due_at <= now
    }
}

/// Discrete mastery classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryTier {
    Unknown,
    Weak,
    Developing,
    Mastered,
}

impl fmt::Display for MasteryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasteryTier::Unknown => write!(f, "unknown"),
            MasteryTier::Weak => write!(f, "weak"),
            MasteryTier::Developing => write!(f, "developing"),
            MasteryTier::Mastered => write!(f, "mastered"),
        }
    }
}

impl FromStr for MasteryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(MasteryTier::Unknown),
            "weak" => Ok(MasteryTier::Weak),
            "developing" => Ok(MasteryTier::Developing),
            "mastered" => Ok(MasteryTier::Mastered),
            other => Err(format!("unknown mastery tier: {other}")),
        }
    }
}

/// Whether an analyzer had enough data to produce its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DataStatus {
    Sufficient,
    InsufficientData { required: usize, observed: usize },
}

impl DataStatus {
    /// `Sufficient` when `observed >= required`.
    pub fn check(required: usize, observed: usize) -> Self {
        if observed >= required {
            DataStatus::Sufficient
        } else {
            DataStatus::InsufficientData { required, observed }
        }
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, DataStatus::Sufficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tier_display_and_parse() {
        assert_eq!(MasteryTier::Mastered.to_string(), "mastered");
        assert_eq!("Weak".parse::<MasteryTier>().unwrap(), MasteryTier::Weak);
        assert!("expert".parse::<MasteryTier>().is_err());
    }

    #[test]
    fn event_clamps_tier_and_duration() {
        let event = AttemptEvent {
            learner_id: "l1".into(),
            knowledge_unit_id: "ku1".into(),
            subject_id: "math".into(),
            is_correct: true,
            difficulty_tier: 9,
            duration_seconds: -4.0,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        };
        assert_eq!(event.tier(), 5);
        assert_eq!(event.duration(), 0.0);
        assert_eq!(event.card_key().to_string(), "l1/ku1");
    }

    #[test]
    fn new_card_is_due_immediately() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let card = MemoryCardState::new("l1", "ku1", now);
        assert_eq!(card.stage, 0);
        assert_eq!(card.ease_factor, 1.0);
        assert!(card.is_due(now));
    }

    #[test]
    fn card_loads_without_extended_fields() {
        let json = r#"{
            "learner_id": "l1",
            "knowledge_unit_id": "ku1",
            "stage": 3,
            "ease_factor": 1.1,
            "next_due_at": "2024-03-05T10:00:00Z",
            "consecutive_correct": 1,
            "lapses": 2
        }"#;
        let card: MemoryCardState = serde_json::from_str(json).unwrap();
        assert_eq!(card.stage, 3);
        assert!(!card.retired);
        assert_eq!(card.review_count, 0);
    }

    #[test]
    fn data_status_serializes_tagged() {
        let json = serde_json::to_string(&DataStatus::check(5, 2)).unwrap();
        assert_eq!(
            json,
            r#"{"status":"insufficient_data","required":5,"observed":2}"#
        );
        assert!(DataStatus::check(5, 5).is_sufficient());
    }
}
