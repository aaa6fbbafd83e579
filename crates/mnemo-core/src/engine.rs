//! Central analytics engine.
//!
//! Fetches one event window and the learner's cards, runs every analyzer over
//! the same snapshot, and merges the results into an [`AnalyticsReport`].
//! Card updates go through the embedded [`CardScheduler`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::config::{EngineConfig, MAX_HORIZON_DAYS, MAX_WINDOW_DAYS};
use crate::error::EngineError;
use crate::model::{AttemptEvent, MemoryCardState};
use crate::report::{AnalyticsReport, DueCard, ReviewQueue, WindowSummary};
use crate::scheduler::{due_at, upcoming, CardScheduler, Transition};
use crate::traits::{call_accessor, CardStateStore, EventLogAccessor};
use crate::{behavior, difficulty, efficiency, forecast, mastery, temporal};

/// The central analytics engine.
pub struct AnalyticsEngine {
    events: Arc<dyn EventLogAccessor>,
    scheduler: CardScheduler,
    config: EngineConfig,
}

impl AnalyticsEngine {
    /// Build an engine. Configuration warnings are logged; an empty interval
    /// ladder is refused.
    pub fn new(
        events: Arc<dyn EventLogAccessor>,
        cards: Arc<dyn CardStateStore>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        if config.scheduler.interval_ladder.is_empty() {
            return Err(EngineError::InvalidConfig(
                "scheduler.interval_ladder must not be empty".into(),
            ));
        }
        for warning in config.validate() {
            tracing::warn!("config {}: {}", warning.field, warning.message);
        }

        let scheduler = CardScheduler::new(
            cards,
            config.scheduler.clone(),
            config.accessor_timeout(),
        );
        Ok(Self {
            events,
            scheduler,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &CardScheduler {
        &self.scheduler
    }

    /// Generate a report for the window ending now.
    pub async fn generate_report(
        &self,
        learner_id: &str,
        window_days: u32,
        forecast_horizon_days: u32,
    ) -> Result<AnalyticsReport, EngineError> {
        self.generate_report_at(learner_id, window_days, forecast_horizon_days, Utc::now())
            .await
    }

    /// Generate a report for the window `[now - window_days, now)`.
    ///
    /// Windows over [`MAX_WINDOW_DAYS`] and horizons over [`MAX_HORIZON_DAYS`]
    /// are rejected with [`EngineError::InvalidInput`].
    pub async fn generate_report_at(
        &self,
        learner_id: &str,
        window_days: u32,
        forecast_horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, EngineError> {
        let since = report_range(window_days, forecast_horizon_days, now)?;
        tracing::debug!(learner_id, %since, until = %now, "fetching report inputs");

        let (fetched, cards) = futures::try_join!(
            call_accessor(
                "fetch_events",
                self.config.accessor_timeout(),
                self.events.fetch_events(learner_id, since, now),
            ),
            self.scheduler.cards(learner_id),
        )?;

        let events = own_events(learner_id, fetched);
        let report = self.assemble(
            learner_id,
            window_days,
            forecast_horizon_days,
            now,
            since,
            &events,
            cards,
        );

        tracing::info!(
            learner_id,
            report_id = %report.id,
            events = report.window.event_count,
            units = report.mastery.units.len(),
            due = report.review.due.len(),
            "report generated"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        learner_id: &str,
        window_days: u32,
        horizon_days: u32,
        now: DateTime<Utc>,
        since: DateTime<Utc>,
        events: &[AttemptEvent],
        cards: Vec<MemoryCardState>,
    ) -> AnalyticsReport {
        let config = &self.config;

        let mastery = mastery::estimate_all(
            events,
            cards.iter().map(|c| c.knowledge_unit_id.as_str()),
            &config.mastery,
        );
        let efficiency = efficiency::analyze(events, config);
        let temporal = temporal::analyze(events, config);
        let difficulty = difficulty::analyze(events, &config.difficulty);
        let behavior = behavior::analyze(&temporal.sessions, window_days, &config.behavior);
        let forecast = forecast::forecast(
            &efficiency.daily,
            config.localize(now).date_naive(),
            horizon_days,
            &config.forecast,
        );

        let total_cards = cards.len();
        let retired_count = cards.iter().filter(|c| c.retired).count();
        let review = ReviewQueue {
            due: due_at(cards.clone(), now).iter().map(DueCard::from).collect(),
            upcoming: upcoming(cards, now, horizon_days)
                .iter()
                .map(DueCard::from)
                .collect(),
            retired_count,
            total_cards,
        };

        AnalyticsReport {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            generated_at: now,
            window: WindowSummary {
                since,
                until: now,
                days: window_days,
                event_count: events.len(),
            },
            mastery,
            efficiency,
            temporal,
            difficulty,
            behavior,
            forecast,
            review,
        }
    }

    /// Update the card for an attempt.
    pub async fn record_attempt(
        &self,
        event: &AttemptEvent,
    ) -> Result<(MemoryCardState, Transition), EngineError> {
        self.scheduler.record_attempt(event).await
    }

    /// Return a card to its first stage.
    pub async fn reset_card(
        &self,
        learner_id: &str,
        knowledge_unit_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryCardState>, EngineError> {
        self.scheduler
            .reset_card(learner_id, knowledge_unit_id, now)
            .await
    }
}

/// Start of the analysis window, after checking both ranges against their
/// limits and against the representable date range.
fn report_range(
    window_days: u32,
    horizon_days: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, EngineError> {
    if window_days > MAX_WINDOW_DAYS {
        return Err(EngineError::InvalidInput(format!(
            "window of {window_days} days exceeds the limit of {MAX_WINDOW_DAYS}"
        )));
    }
    if horizon_days > MAX_HORIZON_DAYS {
        return Err(EngineError::InvalidInput(format!(
            "forecast horizon of {horizon_days} days exceeds the limit of {MAX_HORIZON_DAYS}"
        )));
    }
    let since = now.checked_sub_signed(Duration::days(i64::from(window_days)));
    let until = now.checked_add_signed(Duration::days(i64::from(horizon_days)));
    match (since, until) {
        (Some(since), Some(_)) => Ok(since),
        _ => Err(EngineError::InvalidInput(format!(
            "report range around {now} is outside the supported dates"
        ))),
    }
}

/// Drop events belonging to other learners and flag out-of-order input.
fn own_events(learner_id: &str, fetched: Vec<AttemptEvent>) -> Vec<AttemptEvent> {
    let total = fetched.len();
    let events: Vec<AttemptEvent> = fetched
        .into_iter()
        .filter(|e| e.learner_id == learner_id)
        .collect();
    if events.len() < total {
        tracing::warn!(
            learner_id,
            dropped = total - events.len(),
            "event log returned events for other learners"
        );
    }
    if events.windows(2).any(|w| w[1].occurred_at < w[0].occurred_at) {
        tracing::warn!(learner_id, "event log returned events out of order");
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MasteryTier;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn attempt(learner: &str, unit: &str, correct: bool, hours_ago: i64) -> AttemptEvent {
        AttemptEvent {
            learner_id: learner.into(),
            knowledge_unit_id: unit.into(),
            subject_id: "math".into(),
            is_correct: correct,
            difficulty_tier: 2,
            duration_seconds: 40.0,
            occurred_at: now() - Duration::hours(hours_ago),
        }
    }

    struct StubEvents {
        events: Vec<AttemptEvent>,
        fail: bool,
        delay: Option<std::time::Duration>,
    }

    impl StubEvents {
        fn new(events: Vec<AttemptEvent>) -> Self {
            Self {
                events,
                fail: false,
                delay: None,
            }
        }
    }

    #[async_trait]
    impl EventLogAccessor for StubEvents {
        async fn fetch_events(
            &self,
            _learner_id: &str,
            since: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> anyhow::Result<Vec<AttemptEvent>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                anyhow::bail!("event log unavailable");
            }
            Ok(self
                .events
                .iter()
                .filter(|e| e.occurred_at >= since && e.occurred_at < until)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct StubCards {
        cards: Mutex<HashMap<(String, String), MemoryCardState>>,
    }

    #[async_trait]
    impl CardStateStore for StubCards {
        async fn get_card_state(
            &self,
            learner_id: &str,
            knowledge_unit_id: &str,
        ) -> anyhow::Result<Option<MemoryCardState>> {
            Ok(self
                .cards
                .lock()
                .unwrap()
                .get(&(learner_id.to_string(), knowledge_unit_id.to_string()))
                .cloned())
        }

        async fn save_card_state(&self, state: &MemoryCardState) -> anyhow::Result<()> {
            self.cards.lock().unwrap().insert(
                (state.learner_id.clone(), state.knowledge_unit_id.clone()),
                state.clone(),
            );
            Ok(())
        }

        async fn list_card_states(&self, learner_id: &str) -> anyhow::Result<Vec<MemoryCardState>> {
            Ok(self
                .cards
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.learner_id == learner_id)
                .cloned()
                .collect())
        }
    }

    fn scenario_events() -> Vec<AttemptEvent> {
        // 10 attempts over 3 days, 8 correct, 40s each at tier 2.
        let mut events: Vec<_> = (0..10)
            .map(|i| attempt("l1", "ku1", i >= 2, 60 - (i as i64) * 6))
            .collect();
        events.push(attempt("other", "ku1", false, 1));
        events.sort_by_key(|e| e.occurred_at);
        events
    }

    fn engine(events: StubEvents) -> AnalyticsEngine {
        AnalyticsEngine::new(
            Arc::new(events),
            Arc::new(StubCards::default()),
            EngineConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn scenario_report() {
        let engine = engine(StubEvents::new(scenario_events()));
        let report = engine.generate_report_at("l1", 30, 7, now()).await.unwrap();

        assert_eq!(report.window.event_count, 10);
        assert_eq!(report.generated_at, now());
        let tally = efficiency::AttemptTally::from_events(
            &scenario_events()
                .into_iter()
                .filter(|e| e.learner_id == "l1")
                .collect::<Vec<_>>(),
            &engine.config().efficiency,
        );
        assert!((tally.score(&engine.config().efficiency) - 60.0).abs() < 1e-9);

        let unit = report.mastery.unit("ku1").unwrap();
        assert!(unit.mastery_score.unwrap() > 75.0);
        assert_eq!(unit.tier, MasteryTier::Mastered);
        assert_eq!(report.forecast.trend, forecast::Trend::InsufficientData);
    }

    #[tokio::test]
    async fn analyzer_sections_are_idempotent() {
        let engine = engine(StubEvents::new(scenario_events()));
        let a = engine.generate_report_at("l1", 30, 7, now()).await.unwrap();
        let b = engine.generate_report_at("l1", 30, 7, now()).await.unwrap();
        assert_eq!(a.mastery, b.mastery);
        assert_eq!(a.efficiency, b.efficiency);
        assert_eq!(a.temporal, b.temporal);
        assert_eq!(a.difficulty, b.difficulty);
        assert_eq!(a.behavior, b.behavior);
        assert_eq!(a.forecast, b.forecast);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn empty_window_reports_insufficient_data() {
        let engine = engine(StubEvents::new(vec![]));
        let report = engine.generate_report_at("l1", 30, 7, now()).await.unwrap();
        assert!(!report.mastery.data_status.is_sufficient());
        assert!(report.mastery.units.is_empty());
        assert!(!report.forecast.data_status.is_sufficient());
        assert_eq!(report.review.total_cards, 0);
    }

    #[tokio::test]
    async fn recorded_cards_show_up_in_review() {
        let engine = engine(StubEvents::new(vec![]));
        let event = attempt("l1", "ku9", true, 48);
        engine.record_attempt(&event).await.unwrap();

        let report = engine.generate_report_at("l1", 30, 7, now()).await.unwrap();
        assert_eq!(report.review.total_cards, 1);
        // due one day after the attempt, which is a day before now
        assert_eq!(report.review.due.len(), 1);
        // the card's unit is listed even without attempts in the window
        assert_eq!(report.mastery.unit("ku9").unwrap().tier, MasteryTier::Unknown);
    }

    #[tokio::test]
    async fn accessor_failure_fails_the_report() {
        let mut events = StubEvents::new(vec![]);
        events.fail = true;
        let engine = engine(events);
        let err = engine
            .generate_report_at("l1", 30, 7, now())
            .await
            .unwrap_err();
        assert!(err.is_accessor_failure());
        assert_eq!(err.operation(), Some("fetch_events"));
        assert!(err.to_string().contains("event log unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_accessor_times_out() {
        let mut events = StubEvents::new(vec![]);
        events.delay = Some(std::time::Duration::from_secs(60));
        let engine = engine(events);
        let err = engine
            .generate_report_at("l1", 30, 7, now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Timeout {
                operation: "fetch_events",
                timeout_ms: 5000
            }
        ));
    }

    #[test]
    fn empty_ladder_is_rejected() {
        let mut config = EngineConfig::default();
        config.scheduler.interval_ladder.clear();
        let result = AnalyticsEngine::new(
            Arc::new(StubEvents::new(vec![])),
            Arc::new(StubCards::default()),
            config,
        );
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn oversized_window_is_rejected() {
        let engine = engine(StubEvents::new(scenario_events()));
        for window in [MAX_WINDOW_DAYS + 1, 200_000_000, u32::MAX] {
            let err = engine
                .generate_report_at("l1", window, 7, now())
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
            assert!(!err.is_accessor_failure());
        }
        assert!(engine
            .generate_report_at("l1", MAX_WINDOW_DAYS, 7, now())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn oversized_horizon_is_rejected() {
        let engine = engine(StubEvents::new(scenario_events()));
        for horizon in [MAX_HORIZON_DAYS + 1, 200_000_000, u32::MAX] {
            let err = engine
                .generate_report_at("l1", 30, horizon, now())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("forecast horizon"));
        }
        let report = engine
            .generate_report_at("l1", 30, MAX_HORIZON_DAYS, now())
            .await
            .unwrap();
        assert_eq!(report.window.event_count, 10);
    }

    #[tokio::test]
    async fn range_past_the_calendar_end_is_rejected() {
        let engine = engine(StubEvents::new(vec![]));
        let err = engine
            .generate_report_at("l1", 30, 7, DateTime::<Utc>::MAX_UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
