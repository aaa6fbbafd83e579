pub mod compare;
pub mod due;
pub mod init;
pub mod record;
pub mod report;
pub mod reset;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};

use mnemo_core::AnalyticsEngine;
use mnemo_store::{create_stores, load_config_from, MnemoConfig, Stores};

/// Load configuration and build the stores and engine it describes.
pub(crate) fn open(config_path: Option<&Path>) -> Result<(MnemoConfig, Stores, AnalyticsEngine)> {
    let config = load_config_from(config_path)?;
    tracing::debug!(store = ?config.store.kind, "opening stores");
    let stores = create_stores(&config.store);
    let engine = AnalyticsEngine::new(
        stores.events.clone(),
        stores.cards.clone(),
        config.engine.clone(),
    )
    .context("failed to start engine")?;
    Ok((config, stores, engine))
}
