//! Spaced-repetition scheduler.
//!
//! Each (learner, knowledge unit) pair owns a [`MemoryCardState`] that walks
//! a fixed interval ladder. The transition functions here are pure; the
//! [`CardScheduler`] wraps them with store access and a per-key lock so that
//! concurrent attempts on the same card apply one after another.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::SchedulerConfig;
use crate::error::EngineError;
use crate::model::{AttemptEvent, CardKey, MemoryCardState};
use crate::statistics::round2;
use crate::traits::{call_accessor, CardStateStore};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// What a single review did to a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Card created by its first attempt.
    Created,
    Promoted,
    /// Stage unchanged.
    Held,
    /// Incorrect review that interrupted a streak; stage unchanged.
    StreakBroken,
    Demoted,
    Retired,
    /// The card was retired and the attempt changed nothing.
    Ignored,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Created => write!(f, "created"),
            Transition::Promoted => write!(f, "promoted"),
            Transition::Held => write!(f, "held"),
            Transition::StreakBroken => write!(f, "streak_broken"),
            Transition::Demoted => write!(f, "demoted"),
            Transition::Retired => write!(f, "retired"),
            Transition::Ignored => write!(f, "ignored"),
        }
    }
}

/// `now + ladder[stage] * ease` days, never further out than the last rung.
pub fn next_due(
    stage: usize,
    ease_factor: f64,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> DateTime<Utc> {
    let base = config
        .interval_ladder
        .get(stage.min(config.top_stage()))
        .copied()
        .unwrap_or(1.0);
    let days = (base * ease_factor).min(config.max_interval_days());
    let millis = (days * MILLIS_PER_DAY).round();
    chrono::Duration::try_milliseconds(millis as i64)
        .and_then(|interval| now.checked_add_signed(interval))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Card created by the first attempt on a knowledge unit. The attempt seeds
/// the streak but leaves stage and ease alone.
pub fn first_attempt(
    learner_id: &str,
    knowledge_unit_id: &str,
    is_correct: bool,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> MemoryCardState {
    let mut card = MemoryCardState::new(learner_id, knowledge_unit_id, now);
    card.ease_factor = config.initial_ease;
    card.review_count = 1;
    card.last_reviewed_at = Some(now);
    if is_correct {
        card.consecutive_correct = 1;
    } else {
        card.lapses = 1;
    }
    card.next_due_at = next_due(card.stage, card.ease_factor, now, config);
    card
}

/// Apply one review to an existing card.
pub fn apply_review(
    card: &mut MemoryCardState,
    is_correct: bool,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Transition {
    if card.retired {
        return Transition::Ignored;
    }

    let top = config.top_stage();
    let transition = if is_correct {
        card.consecutive_correct += 1;
        card.ease_factor = round2((card.ease_factor + config.ease_bonus).min(config.max_ease));
        if card.stage < top {
            if card.consecutive_correct >= config.promotion_streak {
                card.stage += 1;
                card.consecutive_correct = 0;
                Transition::Promoted
            } else {
                Transition::Held
            }
        } else if card.consecutive_correct >= config.retire_streak {
            card.retired = true;
            Transition::Retired
        } else {
            Transition::Held
        }
    } else {
        card.lapses += 1;
        card.ease_factor = round2((card.ease_factor - config.ease_penalty).max(config.min_ease));
        let streak_in_progress = card.consecutive_correct > 0;
        card.consecutive_correct = 0;
        if streak_in_progress {
            Transition::StreakBroken
        } else {
            card.stage = card.stage.saturating_sub(config.lapse_penalty_stages);
            Transition::Demoted
        }
    };

    card.review_count += 1;
    card.last_reviewed_at = Some(now);
    card.next_due_at = next_due(card.stage, card.ease_factor, now, config);
    transition
}

/// Return a card to stage 0 and make it due at `now`. Lapse and review
/// history are kept.
pub fn reset(card: &mut MemoryCardState, now: DateTime<Utc>, config: &SchedulerConfig) {
    card.stage = 0;
    card.ease_factor = config.initial_ease;
    card.consecutive_correct = 0;
    card.retired = false;
    card.next_due_at = now;
}

/// Clamp stored values into range. Returns a description of each repair.
pub fn repair(card: &mut MemoryCardState, config: &SchedulerConfig) -> Vec<String> {
    let mut repairs = Vec::new();
    let top = config.top_stage();
    if card.stage > top {
        repairs.push(format!("stage {} clamped to {top}", card.stage));
        card.stage = top;
    }
    if !card.ease_factor.is_finite() {
        repairs.push(format!("ease {} reset to {}", card.ease_factor, config.initial_ease));
        card.ease_factor = config.initial_ease;
    } else if card.ease_factor < config.min_ease || card.ease_factor > config.max_ease {
        let clamped = card.ease_factor.clamp(config.min_ease, config.max_ease);
        repairs.push(format!("ease {} clamped to {clamped}", card.ease_factor));
        card.ease_factor = clamped;
    }
    repairs
}

fn repaired(mut card: MemoryCardState, config: &SchedulerConfig) -> MemoryCardState {
    for repair in repair(&mut card, config) {
        tracing::warn!(card = %card.key(), "repaired invalid card state: {repair}");
    }
    card
}

/// Store-backed scheduler with per-card serialization.
pub struct CardScheduler {
    store: Arc<dyn CardStateStore>,
    locks: DashMap<CardKey, Arc<Mutex<()>>>,
    config: SchedulerConfig,
    timeout: Duration,
}

impl CardScheduler {
    pub fn new(store: Arc<dyn CardStateStore>, config: SchedulerConfig, timeout: Duration) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            config,
            timeout,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn lock_for(&self, key: &CardKey) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(key.clone()).or_default().value())
    }

    /// Drop the table entry once no other caller holds or waits on it.
    fn release(&self, key: &CardKey, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn load(&self, key: &CardKey) -> Result<Option<MemoryCardState>, EngineError> {
        let card = call_accessor(
            "get_card_state",
            self.timeout,
            self.store
                .get_card_state(&key.learner_id, &key.knowledge_unit_id),
        )
        .await?;
        Ok(card.map(|c| repaired(c, &self.config)))
    }

    async fn save(&self, card: &MemoryCardState) -> Result<(), EngineError> {
        call_accessor(
            "save_card_state",
            self.timeout,
            self.store.save_card_state(card),
        )
        .await
    }

    /// Apply an attempt to its card, creating the card on first attempt.
    /// The attempt's own timestamp is the review time.
    pub async fn record_attempt(
        &self,
        event: &AttemptEvent,
    ) -> Result<(MemoryCardState, Transition), EngineError> {
        let key = event.card_key();
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(&key, event).await
        };
        self.release(&key, lock);
        result
    }

    async fn apply_locked(
        &self,
        key: &CardKey,
        event: &AttemptEvent,
    ) -> Result<(MemoryCardState, Transition), EngineError> {
        let now = event.occurred_at;
        let (card, transition) = match self.load(key).await? {
            Some(mut card) => {
                let transition = apply_review(&mut card, event.is_correct, now, &self.config);
                (card, transition)
            }
            None => {
                let card = first_attempt(
                    &key.learner_id,
                    &key.knowledge_unit_id,
                    event.is_correct,
                    now,
                    &self.config,
                );
                (card, Transition::Created)
            }
        };

        if transition == Transition::Ignored {
            tracing::debug!(card = %key, "attempt on retired card ignored");
            return Ok((card, transition));
        }

        self.save(&card).await?;
        tracing::info!(
            card = %key,
            ?transition,
            stage = card.stage,
            ease = card.ease_factor,
            next_due_at = %card.next_due_at,
            "card updated"
        );
        Ok((card, transition))
    }

    /// Reset a card. Returns `None` when the card does not exist.
    pub async fn reset_card(
        &self,
        learner_id: &str,
        knowledge_unit_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryCardState>, EngineError> {
        let key = CardKey::new(learner_id, knowledge_unit_id);
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.reset_locked(&key, now).await
        };
        self.release(&key, lock);
        result
    }

    async fn reset_locked(
        &self,
        key: &CardKey,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryCardState>, EngineError> {
        let Some(mut card) = self.load(key).await? else {
            tracing::debug!(card = %key, "reset requested for unknown card");
            return Ok(None);
        };
        reset(&mut card, now, &self.config);
        self.save(&card).await?;
        tracing::info!(card = %key, "card reset");
        Ok(Some(card))
    }

    /// All cards for a learner, repaired and ordered by knowledge unit.
    pub async fn cards(&self, learner_id: &str) -> Result<Vec<MemoryCardState>, EngineError> {
        let cards = call_accessor(
            "list_card_states",
            self.timeout,
            self.store.list_card_states(learner_id),
        )
        .await?;
        let mut cards: Vec<_> = cards
            .into_iter()
            .map(|c| repaired(c, &self.config))
            .collect();
        cards.sort_by(|a, b| a.knowledge_unit_id.cmp(&b.knowledge_unit_id));
        Ok(cards)
    }

    /// Cards due at `now`, most overdue first.
    pub async fn due_cards(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryCardState>, EngineError> {
        Ok(due_at(self.cards(learner_id).await?, now))
    }

    /// Cards coming due within `days` after `now`, soonest first.
    pub async fn upcoming_cards(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        days: u32,
    ) -> Result<Vec<MemoryCardState>, EngineError> {
        Ok(upcoming(self.cards(learner_id).await?, now, days))
    }
}

/// Non-retired cards with `next_due_at <= now`, most overdue first.
pub fn due_at(cards: Vec<MemoryCardState>, now: DateTime<Utc>) -> Vec<MemoryCardState> {
    let mut due: Vec<_> = cards.into_iter().filter(|c| c.is_due(now)).collect();
    due.sort_by(|a, b| {
        a.next_due_at
            .cmp(&b.next_due_at)
            .then_with(|| a.knowledge_unit_id.cmp(&b.knowledge_unit_id))
    });
    due
}

/// Non-retired cards due after `now` and no later than `now + days`.
pub fn upcoming(cards: Vec<MemoryCardState>, now: DateTime<Utc>, days: u32) -> Vec<MemoryCardState> {
    let until = now
        .checked_add_signed(chrono::Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let mut soon: Vec<_> = cards
        .into_iter()
        .filter(|c| !c.retired && c.next_due_at > now && c.next_due_at <= until)
        .collect();
    soon.sort_by(|a, b| {
        a.next_due_at
            .cmp(&b.next_due_at)
            .then_with(|| a.knowledge_unit_id.cmp(&b.knowledge_unit_id))
    });
    soon
}
