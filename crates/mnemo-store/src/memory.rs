//! In-memory stores, used for embedding and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use mnemo_core::model::{AttemptEvent, CardKey, MemoryCardState};
use mnemo_core::traits::{CardStateStore, EventLogAccessor};

use crate::EventRecorder;

/// Select one learner's events in `[since, until)`, stably ordered by time.
pub(crate) fn window(
    events: impl IntoIterator<Item = AttemptEvent>,
    learner_id: &str,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Vec<AttemptEvent> {
    let mut selected: Vec<AttemptEvent> = events
        .into_iter()
        .filter(|e| e.learner_id == learner_id && e.occurred_at >= since && e.occurred_at < until)
        .collect();
    selected.sort_by_key(|e| e.occurred_at);
    selected
}

/// Event log held in a vector, in append order.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<AttemptEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<AttemptEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventLogAccessor for InMemoryEventLog {
    async fn fetch_events(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttemptEvent>> {
        let events = self.events.read().await;
        Ok(window(events.iter().cloned(), learner_id, since, until))
    }
}

#[async_trait]
impl EventRecorder for InMemoryEventLog {
    async fn append_event(&self, event: &AttemptEvent) -> anyhow::Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Card store keyed by (learner, knowledge unit).
#[derive(Default)]
pub struct InMemoryCardStore {
    cards: DashMap<CardKey, MemoryCardState>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[async_trait]
impl CardStateStore for InMemoryCardStore {
    async fn get_card_state(
        &self,
        learner_id: &str,
        knowledge_unit_id: &str,
    ) -> anyhow::Result<Option<MemoryCardState>> {
        let key = CardKey::new(learner_id, knowledge_unit_id);
        Ok(self.cards.get(&key).map(|c| c.value().clone()))
    }

    async fn save_card_state(&self, state: &MemoryCardState) -> anyhow::Result<()> {
        self.cards.insert(state.key(), state.clone());
        Ok(())
    }

    async fn list_card_states(&self, learner_id: &str) -> anyhow::Result<Vec<MemoryCardState>> {
        Ok(self
            .cards
            .iter()
            .filter(|entry| entry.key().learner_id == learner_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event(learner: &str, unit: &str, minute: i64) -> AttemptEvent {
        AttemptEvent {
            learner_id: learner.into(),
            knowledge_unit_id: unit.into(),
            subject_id: "math".into(),
            is_correct: true,
            difficulty_tier: 1,
            duration_seconds: 10.0,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn fetch_filters_and_orders() {
        let log = InMemoryEventLog::with_events(vec![
            event("l1", "b", 10),
            event("l2", "x", 5),
            event("l1", "a", 0),
            event("l1", "tie", 10),
            event("l1", "late", 60),
        ]);
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let until = since + Duration::minutes(60);
        let events = log.fetch_events("l1", since, until).await.unwrap();
        let units: Vec<_> = events.iter().map(|e| e.knowledge_unit_id.as_str()).collect();
        // `until` is exclusive; ties keep insertion order
        assert_eq!(units, vec!["a", "b", "tie"]);
    }

    #[tokio::test]
    async fn append_then_fetch() {
        let log = InMemoryEventLog::new();
        assert!(log.is_empty().await);
        log.append_event(&event("l1", "a", 0)).await.unwrap();
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn card_store_roundtrip() {
        let store = InMemoryCardStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        assert!(store.get_card_state("l1", "a").await.unwrap().is_none());

        store
            .save_card_state(&MemoryCardState::new("l1", "a", now))
            .await
            .unwrap();
        store
            .save_card_state(&MemoryCardState::new("l2", "a", now))
            .await
            .unwrap();
        let mut updated = MemoryCardState::new("l1", "a", now);
        updated.stage = 3;
        store.save_card_state(&updated).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_card_state("l1", "a").await.unwrap().unwrap().stage, 3);
        assert_eq!(store.list_card_states("l1").await.unwrap().len(), 1);
    }
}
