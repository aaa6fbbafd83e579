//! `mnemo.toml` loading and store factory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mnemo_core::config::EngineConfig;
use mnemo_core::traits::{CardStateStore, EventLogAccessor};

use crate::file::{JsonFileCardStore, JsonlEventLog};
use crate::memory::{InMemoryCardStore, InMemoryEventLog};
use crate::EventRecorder;

/// Which backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::File => write!(f, "file"),
            StoreKind::Memory => write!(f, "memory"),
        }
    }
}

/// The `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    /// JSON-lines event log.
    #[serde(default = "default_events_path")]
    pub events_path: PathBuf,
    /// JSON card-state document.
    #[serde(default = "default_cards_path")]
    pub cards_path: PathBuf,
}

fn default_events_path() -> PathBuf {
    PathBuf::from("./mnemo-data/events.jsonl")
}
fn default_cards_path() -> PathBuf {
    PathBuf::from("./mnemo-data/cards.json")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            events_path: default_events_path(),
            cards_path: default_cards_path(),
        }
    }
}

/// Top-level mnemo configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MnemoConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables expand to nothing.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `mnemo.toml` in the current directory
/// 2. `~/.config/mnemo/config.toml`
///
/// Environment variable overrides: `MNEMO_EVENTS_PATH`, `MNEMO_CARDS_PATH`.
pub fn load_config() -> Result<MnemoConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<MnemoConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("mnemo.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<MnemoConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MnemoConfig::default(),
    };

    if let Ok(events) = std::env::var("MNEMO_EVENTS_PATH") {
        config.store.events_path = PathBuf::from(events);
    }
    if let Ok(cards) = std::env::var("MNEMO_CARDS_PATH") {
        config.store.cards_path = PathBuf::from(cards);
    }

    config.store.events_path = resolve_path(&config.store.events_path);
    config.store.cards_path = resolve_path(&config.store.cards_path);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("mnemo"))
}

/// The accessor pair handed to the engine, plus a writable view of the
/// event log.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventLogAccessor>,
    pub recorder: Arc<dyn EventRecorder>,
    pub cards: Arc<dyn CardStateStore>,
}

/// Build the stores described by a `[store]` section.
pub fn create_stores(config: &StoreConfig) -> Stores {
    match config.kind {
        StoreKind::File => {
            tracing::debug!(
                events = %config.events_path.display(),
                cards = %config.cards_path.display(),
                "using file stores"
            );
            let log = Arc::new(JsonlEventLog::new(&config.events_path));
            Stores {
                events: log.clone(),
                recorder: log,
                cards: Arc::new(JsonFileCardStore::new(&config.cards_path)),
            }
        }
        StoreKind::Memory => {
            let log = Arc::new(InMemoryEventLog::new());
            Stores {
                events: log.clone(),
                recorder: log,
                cards: Arc::new(InMemoryCardStore::new()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_MNEMO_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_MNEMO_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_MNEMO_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        std::env::remove_var("_MNEMO_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = MnemoConfig::default();
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.engine.default_window_days, 30);
        assert_eq!(config.store.cards_path, PathBuf::from("./mnemo-data/cards.json"));
    }

    #[test]
    fn parse_sections() {
        let toml_str = r#"
[engine]
default_window_days = 14

[engine.temporal]
session_break_minutes = 45

[store]
kind = "memory"
events_path = "/data/${USER_DIR}/events.jsonl"
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.default_window_days, 14);
        assert_eq!(config.engine.temporal.session_break_minutes, 45);
        assert_eq!(config.engine.mastery.decay, 0.9);
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.store.cards_path, default_cards_path());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/mnemo.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(&path, "[store]\nkind = \"memory\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.store.kind, StoreKind::Memory);
    }

    #[test]
    fn unknown_store_kind_fails_to_parse() {
        assert!(toml::from_str::<MnemoConfig>("[store]\nkind = \"redis\"\n").is_err());
    }

    #[tokio::test]
    async fn memory_stores_share_one_log() {
        let stores = create_stores(&StoreConfig {
            kind: StoreKind::Memory,
            ..Default::default()
        });
        let event = mnemo_core::model::AttemptEvent {
            learner_id: "l1".into(),
            knowledge_unit_id: "a".into(),
            subject_id: String::new(),
            is_correct: true,
            difficulty_tier: 1,
            duration_seconds: 5.0,
            occurred_at: chrono::Utc::now(),
        };
        stores.recorder.append_event(&event).await.unwrap();
        let fetched = stores
            .events
            .fetch_events(
                "l1",
                event.occurred_at - chrono::Duration::minutes(1),
                event.occurred_at + chrono::Duration::minutes(1),
            )
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
    }
}
