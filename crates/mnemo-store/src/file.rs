//! File-backed stores.
//!
//! Events live in a JSON-lines file, one [`AttemptEvent`] per line, appended
//! in recording order. Cards live in a single pretty-printed JSON array that
//! is rewritten through a temporary file and renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use mnemo_core::model::{AttemptEvent, MemoryCardState};
use mnemo_core::traits::{CardStateStore, EventLogAccessor};

use crate::error::StoreError;
use crate::memory::window;
use crate::EventRecorder;

async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e)),
        _ => Ok(()),
    }
}

/// Parse a JSON-lines event log. Blank lines are skipped; line numbers in
/// errors are 1-based.
pub fn parse_events(path: &Path, content: &str) -> Result<Vec<AttemptEvent>, StoreError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::MalformedEvent {
                path: path.to_path_buf(),
                line: i + 1,
                source,
            })
        })
        .collect()
}

/// Append-only event log in JSON-lines format.
pub struct JsonlEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every event in the file, in file order.
    pub async fn read_all(&self) -> Result<Vec<AttemptEvent>, StoreError> {
        match read_optional(&self.path).await? {
            Some(content) => parse_events(&self.path, &content),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl EventLogAccessor for JsonlEventLog {
    async fn fetch_events(
        &self,
        learner_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AttemptEvent>> {
        let events = self.read_all().await?;
        tracing::debug!(path = %self.path.display(), total = events.len(), "read event log");
        Ok(window(events, learner_id, since, until))
    }
}

#[async_trait]
impl EventRecorder for JsonlEventLog {
    async fn append_event(&self, event: &AttemptEvent) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(event).map_err(StoreError::from)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        ensure_parent(&self.path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }
}

/// Card store persisted as one JSON document.
pub struct JsonFileCardStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_cards(&self) -> Result<Vec<MemoryCardState>, StoreError> {
        match read_optional(&self.path).await? {
            Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
                .map_err(|source| StoreError::MalformedCards {
                    path: self.path.clone(),
                    source,
                }),
            _ => Ok(Vec::new()),
        }
    }

    async fn write_cards(&self, cards: &[MemoryCardState]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(cards)?;
        ensure_parent(&self.path).await?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }
}

#[async_trait]
impl CardStateStore for JsonFileCardStore {
    async fn get_card_state(
        &self,
        learner_id: &str,
        knowledge_unit_id: &str,
    ) -> anyhow::Result<Option<MemoryCardState>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_cards()
            .await?
            .into_iter()
            .find(|c| c.learner_id == learner_id && c.knowledge_unit_id == knowledge_unit_id))
    }

    async fn save_card_state(&self, state: &MemoryCardState) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut cards = self.read_cards().await?;
        match cards.iter_mut().find(|c| c.key() == state.key()) {
            Some(existing) => *existing = state.clone(),
            None => cards.push(state.clone()),
        }
        cards.sort_by_key(|c| c.key());
        self.write_cards(&cards).await?;
        Ok(())
    }

    async fn list_card_states(&self, learner_id: &str) -> anyhow::Result<Vec<MemoryCardState>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_cards()
            .await?
            .into_iter()
            .filter(|c| c.learner_id == learner_id)
            .collect())
    }
}
