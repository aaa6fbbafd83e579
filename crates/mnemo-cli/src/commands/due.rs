//! The `mnemo due` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};

pub async fn execute(
    learner: String,
    now: Option<DateTime<Utc>>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, _, engine) = super::open(config_path.as_deref())?;
    let now = now.unwrap_or_else(Utc::now);

    let scheduler = engine.scheduler();
    let due = scheduler.due_cards(&learner, now).await?;
    let upcoming = scheduler
        .upcoming_cards(&learner, now, config.engine.default_horizon_days)
        .await?;

    if due.is_empty() {
        println!("No cards due for {learner}.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Unit", "Stage", "Ease", "Due", "Overdue", "Lapses"]);
        for card in &due {
            let overdue = now - card.next_due_at;
            table.add_row(vec![
                Cell::new(&card.knowledge_unit_id),
                Cell::new(card.stage),
                Cell::new(format!("{:.2}", card.ease_factor)),
                Cell::new(card.next_due_at.format("%Y-%m-%d %H:%M")),
                Cell::new(format!("{:.1}d", overdue.num_minutes() as f64 / 1440.0)),
                Cell::new(card.lapses),
            ]);
        }
        println!("{} card(s) due for {learner}:", due.len());
        println!("{table}");
    }

    if !upcoming.is_empty() {
        println!(
            "\n{} more due in the next {} day(s).",
            upcoming.len(),
            config.engine.default_horizon_days
        );
    }

    Ok(())
}
