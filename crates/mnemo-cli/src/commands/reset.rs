//! The `mnemo reset` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

pub async fn execute(learner: String, unit: String, config_path: Option<PathBuf>) -> Result<()> {
    let (_, _, engine) = super::open(config_path.as_deref())?;

    match engine.reset_card(&learner, &unit, Utc::now()).await? {
        Some(card) => println!(
            "Reset {unit} for {learner}: stage {}, due now ({} lapses kept)",
            card.stage, card.lapses
        ),
        None => anyhow::bail!("no card for {learner}/{unit}"),
    }

    Ok(())
}
