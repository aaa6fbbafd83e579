//! Accessor traits for the host application's storage layer.
//!
//! The core never touches storage directly. Hosts implement these traits
//! (see the `mnemo-store` crate for in-memory and file-backed versions) and
//! every call may block or fail.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::model::{AttemptEvent, MemoryCardState};

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Read-only source of attempt events.
#[async_trait]
pub trait EventLogAccessor: Send + Sync {
    /// Events for `learner_id` with `since <= occurred_at < until`, in
    /// ascending `occurred_at` order. Ties keep their recorded order.
    async fn fetch_events(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttemptEvent>>;
}

// ---------------------------------------------------------------------------
// Card state store
// ---------------------------------------------------------------------------

/// Durable storage for memory card state, keyed by (learner, knowledge unit).
#[async_trait]
pub trait CardStateStore: Send + Sync {
    /// Load one card, or `None` if the unit has never been attempted.
    async fn get_card_state(
        &self,
        learner_id: &str,
        knowledge_unit_id: &str,
    ) -> anyhow::Result<Option<MemoryCardState>>;

    /// Insert or replace a card.
    async fn save_card_state(&self, state: &MemoryCardState) -> anyhow::Result<()>;

    /// All cards for a learner, in any order.
    async fn list_card_states(&self, learner_id: &str) -> anyhow::Result<Vec<MemoryCardState>>;
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// Run one accessor call under `deadline`, mapping both failure modes into
/// [`EngineError`].
pub(crate) async fn call_accessor<T, F>(
    operation: &'static str,
    deadline: Duration,
    call: F,
) -> Result<T, EngineError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => {
            tracing::error!(operation, error = %format!("{source:#}"), "accessor call failed");
            Err(EngineError::AccessorFailure { operation, source })
        }
        Err(_) => {
            let timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
            tracing::error!(operation, timeout_ms, "accessor call timed out");
            Err(EngineError::Timeout {
                operation,
                timeout_ms,
            })
        }
    }
}
