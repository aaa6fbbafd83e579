//! Fault-injecting stores for testing the engine's failure paths.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mnemo_core::model::{AttemptEvent, MemoryCardState};
use mnemo_core::traits::{CardStateStore, EventLogAccessor};

/// A store whose every call fails with a fixed message.
pub struct FailingStore {
    message: String,
    call_count: AtomicU32,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            call_count: AtomicU32::new(0),
        }
    }

    /// Number of calls made to this store.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    fn fail<T>(&self) -> anyhow::Result<T> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Err(anyhow::anyhow!("{}", self.message))
    }
}

#[async_trait]
impl EventLogAccessor for FailingStore {
    async fn fetch_events(
        &self,
        _learner_id: &str,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttemptEvent>> {
        self.fail()
    }
}

#[async_trait]
impl CardStateStore for FailingStore {
    async fn get_card_state(
        &self,
        _learner_id: &str,
        _knowledge_unit_id: &str,
    ) -> anyhow::Result<Option<MemoryCardState>> {
        self.fail()
    }

    async fn save_card_state(&self, _state: &MemoryCardState) -> anyhow::Result<()> {
        self.fail()
    }

    async fn list_card_states(&self, _learner_id: &str) -> anyhow::Result<Vec<MemoryCardState>> {
        self.fail()
    }
}

/// Wraps another store and sleeps before delegating each call.
pub struct DelayedStore<S> {
    inner: Arc<S>,
    delay: Duration,
    call_count: AtomicU32,
}

impl<S> DelayedStore<S> {
    pub fn new(inner: Arc<S>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    async fn pause(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl<S: EventLogAccessor> EventLogAccessor for DelayedStore<S> {
    async fn fetch_events(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttemptEvent>> {
        self.pause().await;
        self.inner.fetch_events(learner_id, since, until).await
    }
}

#[async_trait]
impl<S: CardStateStore> CardStateStore for DelayedStore<S> {
    async fn get_card_state(
        &self,
        learner_id: &str,
        knowledge_unit_id: &str,
    ) -> anyhow::Result<Option<MemoryCardState>> {
        self.pause().await;
        self.inner.get_card_state(learner_id, knowledge_unit_id).await
    }

    async fn save_card_state(&self, state: &MemoryCardState) -> anyhow::Result<()> {
        self.pause().await;
        self.inner.save_card_state(state).await
    }

    async fn list_card_states(&self, learner_id: &str) -> anyhow::Result<Vec<MemoryCardState>> {
        self.pause().await;
        self.inner.list_card_states(learner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCardStore;

    #[tokio::test]
    async fn failing_store_counts_calls() {
        let store = FailingStore::new("disk on fire");
        let err = store.list_card_states("l1").await.unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
        assert!(store.fetch_events("l1", Utc::now(), Utc::now()).await.is_err());
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_store_delegates() {
        let inner = Arc::new(InMemoryCardStore::new());
        let store = DelayedStore::new(Arc::clone(&inner), Duration::from_secs(2));
        let card = MemoryCardState::new("l1", "a", Utc::now());

        let started = tokio::time::Instant::now();
        store.save_card_state(&card).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(inner.len(), 1);
        assert!(store.get_card_state("l1", "a").await.unwrap().is_some());
        assert_eq!(store.call_count(), 2);
    }
}
