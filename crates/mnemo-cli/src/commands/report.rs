//! The `mnemo report` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};

use mnemo_core::model::DataStatus;
use mnemo_core::AnalyticsReport;

pub async fn execute(
    learner: String,
    window_days: Option<u32>,
    horizon: Option<u32>,
    now: Option<DateTime<Utc>>,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "text" | "json" | "markdown" | "md"),
        "unknown format '{format}', expected text, json or markdown"
    );

    let (config, _, engine) = super::open(config_path.as_deref())?;
    let window_days = window_days.unwrap_or(config.engine.default_window_days);
    let horizon = horizon.unwrap_or(config.engine.default_horizon_days);
    anyhow::ensure!(window_days > 0, "window must be at least one day");

    let report = engine
        .generate_report_at(&learner, window_days, horizon, now.unwrap_or_else(Utc::now))
        .await?;

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report saved to {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "markdown" | "md" => print!("{}", render_markdown(&report)),
        _ => print_text(&report),
    }

    Ok(())
}

fn status(status: &DataStatus) -> String {
    match status {
        DataStatus::Sufficient => "ok".to_string(),
        DataStatus::InsufficientData { required, observed } => {
            format!("insufficient data ({observed}/{required})")
        }
    }
}

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

fn print_text(report: &AnalyticsReport) {
    println!(
        "Learner {}: {} attempts over {} day(s), {} to {}",
        report.learner_id,
        report.window.event_count,
        report.window.days,
        report.window.since.format("%Y-%m-%d"),
        report.window.until.format("%Y-%m-%d")
    );

    println!("\nMastery ({})", status(&report.mastery.data_status));
    if !report.mastery.units.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Unit", "Score", "Tier", "Samples"]);
        for unit in &report.mastery.units {
            table.add_row(vec![
                Cell::new(&unit.knowledge_unit_id),
                Cell::new(score(unit.mastery_score)),
                Cell::new(unit.tier),
                Cell::new(unit.sample_size),
            ]);
        }
        println!("{table}");
    }
    if !report.mastery.focus_units.is_empty() {
        println!("Focus: {}", report.mastery.focus_units.join(", "));
    }

    let efficiency = &report.efficiency;
    println!(
        "\nEfficiency ({}): score {}, accuracy {}, speed factor {}",
        status(&efficiency.data_status),
        score(efficiency.aggregate_score),
        score(efficiency.overall_accuracy),
        efficiency
            .overall_speed_factor
            .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
    );
    for rec in &efficiency.recommendations {
        println!("  - {rec}");
    }

    let temporal = &report.temporal;
    println!(
        "\nSessions ({}): {} sessions, mean {:.1} min, {:.1} study min total",
        status(&temporal.data_status),
        temporal.session_stats.count,
        temporal.session_stats.mean_length_minutes,
        temporal.session_stats.total_study_minutes
    );
    if !temporal.peak_hours.is_empty() {
        let hours: Vec<String> = temporal
            .peak_hours
            .iter()
            .map(|h| format!("{:02}:00 ({:.0})", h.hour, h.score))
            .collect();
        println!("Peak hours: {}", hours.join(", "));
    }

    let difficulty = &report.difficulty;
    println!(
        "\nDifficulty ({}): current tier {}, recommendation {}, readiness {}",
        status(&difficulty.data_status),
        difficulty
            .current_tier
            .map_or_else(|| "-".to_string(), |t| t.to_string()),
        difficulty.recommendation,
        difficulty.readiness
    );

    let behavior = &report.behavior;
    println!(
        "\nBehavior ({}): style {}, habit score {}",
        status(&behavior.data_status),
        behavior
            .learning_style
            .map_or_else(|| "-".to_string(), |s| s.to_string()),
        score(behavior.habit_score)
    );

    let forecast = &report.forecast;
    println!(
        "\nForecast ({}): trend {}, risk {}, confidence {:.2}",
        status(&forecast.data_status),
        forecast.trend,
        forecast.risk,
        forecast.confidence_level
    );

    let review = &report.review;
    println!(
        "\nReview: {} due, {} upcoming, {} retired, {} total",
        review.due.len(),
        review.upcoming.len(),
        review.retired_count,
        review.total_cards
    );
    if !review.due.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Unit", "Stage", "Ease", "Due", "Lapses"]);
        for card in &review.due {
            table.add_row(vec![
                Cell::new(&card.knowledge_unit_id),
                Cell::new(card.stage),
                Cell::new(format!("{:.2}", card.ease_factor)),
                Cell::new(card.next_due_at.format("%Y-%m-%d %H:%M")),
                Cell::new(card.lapses),
            ]);
        }
        println!("{table}");
    }
}

fn render_markdown(report: &AnalyticsReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Learning report: {}\n\n", report.learner_id));
    md.push_str(&format!(
        "**Window:** {} to {} ({} days, {} attempts)\n\n",
        report.window.since.to_rfc3339(),
        report.window.until.to_rfc3339(),
        report.window.days,
        report.window.event_count
    ));

    md.push_str("## Mastery\n\n");
    if report.mastery.units.is_empty() {
        md.push_str("_No attempts in window._\n\n");
    } else {
        md.push_str("| Unit | Score | Tier | Samples |\n");
        md.push_str("|------|-------|------|---------|\n");
        for unit in &report.mastery.units {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                unit.knowledge_unit_id,
                score(unit.mastery_score),
                unit.tier,
                unit.sample_size
            ));
        }
        md.push('\n');
    }

    md.push_str("## Efficiency\n\n");
    md.push_str(&format!(
        "- Score: {}\n- Accuracy: {}\n",
        score(report.efficiency.aggregate_score),
        score(report.efficiency.overall_accuracy)
    ));
    for rec in &report.efficiency.recommendations {
        md.push_str(&format!("- {rec}\n"));
    }
    md.push('\n');

    md.push_str("## Habits\n\n");
    md.push_str(&format!(
        "- Sessions: {}\n- Habit score: {}\n- Difficulty recommendation: {}\n- Forecast: {} ({})\n\n",
        report.temporal.session_stats.count,
        score(report.behavior.habit_score),
        report.difficulty.recommendation,
        report.forecast.trend,
        report.forecast.risk
    ));

    md.push_str("## Review queue\n\n");
    md.push_str(&format!(
        "{} due, {} upcoming, {} retired\n",
        report.review.due.len(),
        report.review.upcoming.len(),
        report.review.retired_count
    ));
    for card in &report.review.due {
        md.push_str(&format!(
            "- {} (stage {}, due {})\n",
            card.knowledge_unit_id,
            card.stage,
            card.next_due_at.to_rfc3339()
        ));
    }

    md
}
