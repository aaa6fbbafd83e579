//! Temporal patterns: session segmentation, hour/weekday distributions, and
//! ranking of the hours where the learner performs best.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::efficiency::AttemptTally;
use crate::model::{AttemptEvent, DataStatus};
use crate::statistics::{accuracy_percent, mean, variance};

/// A run of attempts with no gap longer than the session-break threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub attempts: usize,
    pub correct: usize,
    pub study_seconds: f64,
    /// Span from the first attempt to the end of the last one.
    pub length_minutes: f64,
}

impl SessionWindow {
    fn open(event: &AttemptEvent) -> Self {
        Self {
            started_at: event.occurred_at,
            ended_at: event.occurred_at,
            attempts: 0,
            correct: 0,
            study_seconds: 0.0,
            length_minutes: 0.0,
        }
    }

    fn push(&mut self, event: &AttemptEvent) {
        self.ended_at = event.occurred_at;
        self.attempts += 1;
        if event.is_correct {
            self.correct += 1;
        }
        self.study_seconds += event.duration();
        let span = (self.ended_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.length_minutes = (span + event.duration()) / 60.0;
    }

    pub fn accuracy(&self) -> Option<f64> {
        accuracy_percent(self.correct, self.attempts)
    }
}

/// Split chronologically ordered events into sessions.
pub fn segment_sessions(events: &[AttemptEvent], session_break: Duration) -> Vec<SessionWindow> {
    let mut sessions: Vec<SessionWindow> = Vec::new();
    let mut previous: Option<DateTime<Utc>> = None;

    for event in events {
        let starts_new = match previous {
            Some(prev) => event.occurred_at - prev > session_break,
            None => true,
        };
        if starts_new {
            sessions.push(SessionWindow::open(event));
        }
        if let Some(current) = sessions.last_mut() {
            current.push(event);
        }
        previous = Some(event.occurred_at);
    }

    sessions
}

/// Attempts falling into one hour-of-day or weekday bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Hour 0..=23 or weekday 0 (Monday)..=6.
    pub index: u32,
    pub attempts: usize,
    pub correct: usize,
    pub accuracy: Option<f64>,
    pub study_seconds: f64,
}

/// A ranked high-performance hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourPerformance {
    pub hour: u32,
    /// Efficiency-shaped score, 0..=100.
    pub score: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub count: usize,
    pub mean_length_minutes: f64,
    pub length_variance: f64,
    pub mean_attempts: f64,
    pub total_study_minutes: f64,
}

/// Temporal analysis of the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalReport {
    pub data_status: DataStatus,
    pub sessions: Vec<SessionWindow>,
    pub session_stats: SessionStats,
    /// 24 buckets, index = hour of day.
    pub hourly: Vec<TimeBucket>,
    /// 7 buckets, index = weekday with Monday = 0.
    pub weekday: Vec<TimeBucket>,
    /// Best hours, highest score first.
    pub peak_hours: Vec<HourPerformance>,
}

/// Aggregate statistics over a list of sessions.
pub fn session_stats(sessions: &[SessionWindow]) -> SessionStats {
    let lengths: Vec<f64> = sessions.iter().map(|s| s.length_minutes).collect();
    let attempts: Vec<f64> = sessions.iter().map(|s| s.attempts as f64).collect();
    SessionStats {
        count: sessions.len(),
        mean_length_minutes: mean(&lengths).unwrap_or(0.0),
        length_variance: variance(&lengths).unwrap_or(0.0),
        mean_attempts: mean(&attempts).unwrap_or(0.0),
        total_study_minutes: sessions.iter().map(|s| s.study_seconds).sum::<f64>() / 60.0,
    }
}

/// Rank hours by performance. Only hours with at least `min_samples`
/// attempts qualify; ties go to the larger sample, then the earlier hour.
pub fn rank_hours(
    tallies: &[AttemptTally; 24],
    config: &EngineConfig,
) -> Vec<HourPerformance> {
    let mut ranked: Vec<HourPerformance> = tallies
        .iter()
        .enumerate()
        .filter(|(_, t)| t.attempts >= config.temporal.min_hour_samples)
        .map(|(hour, t)| HourPerformance {
            hour: hour as u32,
            score: t.score(&config.efficiency),
            sample_size: t.attempts,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.sample_size.cmp(&a.sample_size))
            .then_with(|| a.hour.cmp(&b.hour))
    });
    ranked.truncate(config.temporal.peak_hours_limit);
    ranked
}

fn buckets(tallies: &[AttemptTally]) -> Vec<TimeBucket> {
    tallies
        .iter()
        .enumerate()
        .map(|(index, t)| TimeBucket {
            index: index as u32,
            attempts: t.attempts,
            correct: t.correct,
            accuracy: accuracy_percent(t.correct, t.attempts),
            study_seconds: t.study_seconds,
        })
        .collect()
}

/// Run all temporal steps over the window.
pub fn analyze(events: &[AttemptEvent], config: &EngineConfig) -> TemporalReport {
    let session_break = Duration::minutes(i64::from(config.temporal.session_break_minutes));
    let sessions = segment_sessions(events, session_break);

    let mut hourly = [AttemptTally::default(); 24];
    let mut weekday = [AttemptTally::default(); 7];
    for event in events {
        let local = config.localize(event.occurred_at);
        hourly[local.hour() as usize].add(event, &config.efficiency);
        weekday[local.weekday().num_days_from_monday() as usize].add(event, &config.efficiency);
    }

    TemporalReport {
        data_status: DataStatus::check(1, events.len()),
        session_stats: session_stats(&sessions),
        sessions,
        hourly: buckets(&hourly),
        weekday: buckets(&weekday),
        peak_hours: rank_hours(&hourly, config),
    }
}
