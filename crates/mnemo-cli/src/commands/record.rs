//! The `mnemo record` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use mnemo_core::model::{AttemptEvent, MAX_DIFFICULTY_TIER, MIN_DIFFICULTY_TIER};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    learner: String,
    unit: String,
    subject: String,
    correct: bool,
    incorrect: bool,
    difficulty: u8,
    duration: f64,
    at: Option<DateTime<Utc>>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        correct != incorrect,
        "pass exactly one of --correct or --incorrect"
    );
    anyhow::ensure!(
        (MIN_DIFFICULTY_TIER..=MAX_DIFFICULTY_TIER).contains(&difficulty),
        "difficulty must be between {MIN_DIFFICULTY_TIER} and {MAX_DIFFICULTY_TIER}"
    );
    anyhow::ensure!(
        duration.is_finite() && duration >= 0.0,
        "duration must be a non-negative number of seconds"
    );

    let (_, stores, engine) = super::open(config_path.as_deref())?;

    let event = AttemptEvent {
        learner_id: learner,
        knowledge_unit_id: unit,
        subject_id: subject,
        is_correct: correct,
        difficulty_tier: difficulty,
        duration_seconds: duration,
        occurred_at: at.unwrap_or_else(Utc::now),
    };

    stores
        .recorder
        .append_event(&event)
        .await
        .context("failed to append attempt to the event log")?;
    let (card, transition) = engine.record_attempt(&event).await.with_context(|| {
        format!(
            "attempt was appended to the event log but card {}/{} was not updated; \
             do not record it again",
            event.learner_id, event.knowledge_unit_id
        )
    })?;

    println!(
        "Recorded {} attempt on {} for {}",
        if event.is_correct { "correct" } else { "incorrect" },
        event.knowledge_unit_id,
        event.learner_id
    );
    println!(
        "  card: {transition}, stage {}, ease {:.2}, streak {}, lapses {}",
        card.stage, card.ease_factor, card.consecutive_correct, card.lapses
    );
    if card.retired {
        println!("  retired; reset the card to schedule it again");
    } else {
        println!("  next review: {}", card.next_due_at.to_rfc3339());
    }

    Ok(())
}
