//! The `mnemo compare` command.

use std::path::PathBuf;

use anyhow::Result;

use mnemo_core::report::AnalyticsReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = AnalyticsReport::load_json(&baseline_path)?;
    let current = AnalyticsReport::load_json(&current_path)?;

    let comparison = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", comparison.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
        _ => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                comparison.regressions.len(),
                comparison.improvements.len(),
                comparison.unchanged
            );

            if !comparison.regressions.is_empty() {
                println!("\nRegressions:");
                for r in &comparison.regressions {
                    println!(
                        "  {} {:.1} -> {:.1} ({:+.1})",
                        r.knowledge_unit_id, r.baseline_score, r.current_score, r.delta
                    );
                }
            }

            if !comparison.improvements.is_empty() {
                println!("\nImprovements:");
                for i in &comparison.improvements {
                    println!(
                        "  {} {:.1} -> {:.1} ({:+.1})",
                        i.knowledge_unit_id, i.baseline_score, i.current_score, i.delta
                    );
                }
            }

            if !comparison.tier_changes.is_empty() {
                println!("\nTier changes:");
                for t in &comparison.tier_changes {
                    println!("  {}: {} -> {}", t.knowledge_unit_id, t.from, t.to);
                }
            }

            if !comparison.new_units.is_empty() {
                println!("\n{} new unit(s)", comparison.new_units.len());
            }
            if !comparison.dropped_units.is_empty() {
                println!("{} dropped unit(s)", comparison.dropped_units.len());
            }
        }
    }

    Ok(())
}
