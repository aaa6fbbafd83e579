//! Analytics report types with JSON persistence and mastery comparison.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::behavior::BehaviorReport;
use crate::difficulty::DifficultyReport;
use crate::efficiency::EfficiencyReport;
use crate::forecast::ForecastReport;
use crate::mastery::MasteryReport;
use crate::model::{MasteryTier, MemoryCardState};
use crate::temporal::TemporalReport;

/// A complete analytics report for one learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    /// Unique report identifier.
    pub id: Uuid,
    pub learner_id: String,
    /// Single timestamp shared by every section.
    pub generated_at: DateTime<Utc>,
    pub window: WindowSummary,
    pub mastery: MasteryReport,
    pub efficiency: EfficiencyReport,
    pub temporal: TemporalReport,
    pub difficulty: DifficultyReport,
    pub behavior: BehaviorReport,
    pub forecast: ForecastReport,
    /// Scheduler state at generation time, read-only.
    pub review: ReviewQueue,
}

/// The event window the analyzers saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub days: u32,
    pub event_count: usize,
}

/// A card in the review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCard {
    pub knowledge_unit_id: String,
    pub stage: usize,
    pub ease_factor: f64,
    pub next_due_at: DateTime<Utc>,
    pub lapses: u32,
}

impl From<&MemoryCardState> for DueCard {
    fn from(card: &MemoryCardState) -> Self {
        Self {
            knowledge_unit_id: card.knowledge_unit_id.clone(),
            stage: card.stage,
            ease_factor: card.ease_factor,
            next_due_at: card.next_due_at,
            lapses: card.lapses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewQueue {
    /// Due now, most overdue first.
    pub due: Vec<DueCard>,
    /// Due within the forecast horizon, soonest first.
    pub upcoming: Vec<DueCard>,
    pub retired_count: usize,
    pub total_cards: usize,
}

impl AnalyticsReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AnalyticsReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare mastery in this report against a baseline. Score moves of
    /// more than `threshold` points are reported.
    pub fn compare(&self, baseline: &AnalyticsReport, threshold: f64) -> MasteryComparison {
        let score_map = |report: &AnalyticsReport| -> BTreeMap<String, (Option<f64>, MasteryTier)> {
            report
                .mastery
                .units
                .iter()
                .map(|s| (s.knowledge_unit_id.clone(), (s.mastery_score, s.tier)))
                .collect()
        };

        let baseline_units = score_map(baseline);
        let current_units = score_map(self);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut tier_changes = Vec::new();
        let mut unchanged = 0usize;
        let mut new_units = Vec::new();

        for (unit, &(current, current_tier)) in &current_units {
            let Some(&(previous, baseline_tier)) = baseline_units.get(unit) else {
                new_units.push(unit.clone());
                continue;
            };

            if current_tier != baseline_tier {
                tier_changes.push(TierChange {
                    knowledge_unit_id: unit.clone(),
                    from: baseline_tier,
                    to: current_tier,
                });
            }

            match (previous, current) {
                (Some(b), Some(c)) if c - b < -threshold => regressions.push(ScoreChange {
                    knowledge_unit_id: unit.clone(),
                    baseline_score: b,
                    current_score: c,
                    delta: c - b,
                }),
                (Some(b), Some(c)) if c - b > threshold => improvements.push(ScoreChange {
                    knowledge_unit_id: unit.clone(),
                    baseline_score: b,
                    current_score: c,
                    delta: c - b,
                }),
                _ => unchanged += 1,
            }
        }

        let dropped_units = baseline_units
            .keys()
            .filter(|k| !current_units.contains_key(*k))
            .cloned()
            .collect();

        MasteryComparison {
            regressions,
            improvements,
            tier_changes,
            unchanged,
            new_units,
            dropped_units,
        }
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryComparison {
    /// Units whose score fell by more than the threshold.
    pub regressions: Vec<ScoreChange>,
    /// Units whose score rose by more than the threshold.
    pub improvements: Vec<ScoreChange>,
    pub tier_changes: Vec<TierChange>,
    /// Units present in both reports with no significant score change.
    pub unchanged: usize,
    /// Units in current but not baseline.
    pub new_units: Vec<String>,
    /// Units in baseline but not current.
    pub dropped_units: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreChange {
    pub knowledge_unit_id: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChange {
    pub knowledge_unit_id: String,
    pub from: MasteryTier,
    pub to: MasteryTier,
}

impl MasteryComparison {
    /// Format the comparison as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged, {} new, {} dropped\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged,
            self.new_units.len(),
            self.dropped_units.len()
        ));

        if !self.regressions.is_empty() {
            md.push_str("### Regressions\n\n");
            md.push_str("| Unit | Baseline | Current | Delta |\n");
            md.push_str("|------|----------|---------|-------|\n");
            for r in &self.regressions {
                md.push_str(&format!(
                    "| {} | {:.1} | {:.1} | {:.1} |\n",
                    r.knowledge_unit_id, r.baseline_score, r.current_score, r.delta
                ));
            }
            md.push('\n');
        }

        if !self.improvements.is_empty() {
            md.push_str("### Improvements\n\n");
            md.push_str("| Unit | Baseline | Current | Delta |\n");
            md.push_str("|------|----------|---------|-------|\n");
            for i in &self.improvements {
                md.push_str(&format!(
                    "| {} | {:.1} | {:.1} | +{:.1} |\n",
                    i.knowledge_unit_id, i.baseline_score, i.current_score, i.delta
                ));
            }
            md.push('\n');
        }

        if !self.tier_changes.is_empty() {
            md.push_str("### Tier changes\n\n");
            for t in &self.tier_changes {
                md.push_str(&format!("- {}: {} -> {}\n", t.knowledge_unit_id, t.from, t.to));
            }
        }

        md
    }

    /// Returns true if any unit lost mastery.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}
