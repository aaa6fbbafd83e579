//! The `mnemo init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("mnemo.toml").exists() {
        println!("mnemo.toml already exists, skipping.");
    } else {
        std::fs::write("mnemo.toml", SAMPLE_CONFIG)?;
        println!("Created mnemo.toml");
    }

    std::fs::create_dir_all("mnemo-data")?;

    println!("\nNext steps:");
    println!("  1. Run: mnemo validate");
    println!("  2. Run: mnemo record --learner me --unit fractions --correct --difficulty 2 --duration 35");
    println!("  3. Run: mnemo report --learner me");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# mnemo configuration

[store]
kind = "file"
events_path = "./mnemo-data/events.jsonl"
cards_path = "./mnemo-data/cards.json"

[engine]
default_window_days = 30
default_horizon_days = 7
utc_offset_minutes = 0
accessor_timeout_ms = 5000

[engine.mastery]
decay = 0.9
min_samples = 3

[engine.temporal]
session_break_minutes = 30

[engine.difficulty]
target_accuracy = 75.0

[engine.scheduler]
interval_ladder = [1.0, 2.0, 4.0, 7.0, 15.0, 30.0, 60.0]
promotion_streak = 2
lapse_penalty_stages = 2
"#;
