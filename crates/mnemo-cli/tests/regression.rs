//! Mastery regression detection across saved reports.
//!
//! Two reports are generated for the same learner a week apart, written to
//! disk, reloaded and compared, both through the library and the CLI.

use std::sync::Arc;

use assert_cmd::Command;
use chrono::{DateTime, Duration, TimeZone, Utc};
use predicates::prelude::*;

use mnemo_core::config::EngineConfig;
use mnemo_core::model::{AttemptEvent, MasteryTier};
use mnemo_core::{AnalyticsEngine, AnalyticsReport};
use mnemo_store::memory::{InMemoryCardStore, InMemoryEventLog};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 18, 0, 0).unwrap()
}

fn attempt(unit: &str, correct: bool, day: i64, minute: i64) -> AttemptEvent {
    AttemptEvent {
        learner_id: "ana".into(),
        knowledge_unit_id: unit.into(),
        subject_id: "lang".into(),
        is_correct: correct,
        difficulty_tier: 2,
        duration_seconds: 25.0,
        occurred_at: start() + Duration::days(day) + Duration::minutes(minute),
    }
}

/// Week one: verbs solid, nouns shaky. Week two: verbs fall apart, nouns
/// recover, and a new unit appears.
fn history() -> Vec<AttemptEvent> {
    let mut events = Vec::new();
    for m in 0..6 {
        events.push(attempt("verbs", true, 0, m));
        events.push(attempt("nouns", m % 2 == 0, 1, m));
    }
    for m in 0..6 {
        events.push(attempt("verbs", false, 8, m));
        events.push(attempt("nouns", true, 9, m));
        events.push(attempt("adjectives", true, 9, 10 + m));
    }
    events.sort_by_key(|e| e.occurred_at);
    events
}

async fn reports() -> (AnalyticsReport, AnalyticsReport) {
    let engine = AnalyticsEngine::new(
        Arc::new(InMemoryEventLog::with_events(history())),
        Arc::new(InMemoryCardStore::new()),
        EngineConfig::default(),
    )
    .unwrap();
    let baseline = engine
        .generate_report_at("ana", 30, 7, start() + Duration::days(3))
        .await
        .unwrap();
    let current = engine
        .generate_report_at("ana", 30, 7, start() + Duration::days(10))
        .await
        .unwrap();
    (baseline, current)
}

#[tokio::test]
async fn detects_regressions_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (baseline, current) = reports().await;

    let baseline_path = dir.path().join("baseline.json");
    let current_path = dir.path().join("reports/current.json");
    baseline.save_json(&baseline_path).unwrap();
    current.save_json(&current_path).unwrap();

    let baseline = AnalyticsReport::load_json(&baseline_path).unwrap();
    let current = AnalyticsReport::load_json(&current_path).unwrap();
    let comparison = current.compare(&baseline, 5.0);

    assert!(comparison.has_regressions());
    assert_eq!(comparison.regressions.len(), 1);
    assert_eq!(comparison.regressions[0].knowledge_unit_id, "verbs");
    assert!(comparison.regressions[0].delta < -50.0);

    assert_eq!(comparison.improvements.len(), 1);
    assert_eq!(comparison.improvements[0].knowledge_unit_id, "nouns");
    assert_eq!(comparison.new_units, vec!["adjectives".to_string()]);
    assert!(comparison.dropped_units.is_empty());

    let verbs = comparison
        .tier_changes
        .iter()
        .find(|t| t.knowledge_unit_id == "verbs")
        .unwrap();
    assert_eq!(verbs.from, MasteryTier::Mastered);
    assert_eq!(verbs.to, MasteryTier::Weak);

    let md = comparison.to_markdown();
    assert!(md.contains("### Regressions"));
    assert!(md.contains("verbs: mastered -> weak"));
}

#[tokio::test]
async fn identical_reports_have_no_changes() {
    let (baseline, _) = reports().await;
    let comparison = baseline.compare(&baseline, 0.0);
    assert!(!comparison.has_regressions());
    assert!(comparison.improvements.is_empty());
    assert!(comparison.tier_changes.is_empty());
    assert_eq!(comparison.unchanged, baseline.mastery.units.len());
}

#[tokio::test]
async fn cli_compare_prints_regressions() {
    let dir = tempfile::tempdir().unwrap();
    let (baseline, current) = reports().await;
    baseline.save_json(&dir.path().join("baseline.json")).unwrap();
    current.save_json(&dir.path().join("current.json")).unwrap();

    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("mnemo").unwrap();
    cmd.current_dir(dir.path())
        .args(["compare", "--baseline", "baseline.json", "--current", "current.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 regressions"))
        .stdout(predicate::str::contains("verbs"))
        .stdout(predicate::str::contains("1 new unit(s)"));

    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("mnemo").unwrap();
    let output = cmd
        .current_dir(dir.path())
        .args(["compare", "--baseline", "baseline.json", "--current", "current.json"])
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["regressions"][0]["knowledge_unit_id"], "verbs");
}
