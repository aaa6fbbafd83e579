//! mnemo-store: Storage backends for the mnemo engine.
//!
//! Implements the `EventLogAccessor` and `CardStateStore` traits from
//! `mnemo-core` in memory and on disk (JSON lines for events, a JSON
//! document for card state), plus the `mnemo.toml` loader that picks one.

pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod mock;

pub use config::{create_stores, load_config, load_config_from, MnemoConfig, StoreConfig, Stores};
pub use error::StoreError;

use async_trait::async_trait;
use mnemo_core::model::AttemptEvent;
use mnemo_core::traits::EventLogAccessor;

/// An event log that also accepts new events.
#[async_trait]
pub trait EventRecorder: EventLogAccessor {
    async fn append_event(&self, event: &AttemptEvent) -> anyhow::Result<()>;
}
