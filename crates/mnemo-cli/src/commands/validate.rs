//! The `mnemo validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = mnemo_store::load_config_from(config_path.as_deref())?;

    println!(
        "Store: {} (events: {}, cards: {})",
        config.store.kind,
        config.store.events_path.display(),
        config.store.cards_path.display()
    );

    let warnings = config.engine.validate();
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.field, w.message);
    }

    if warnings.is_empty() {
        println!("Configuration valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
