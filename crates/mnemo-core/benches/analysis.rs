use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mnemo_core::config::EngineConfig;
use mnemo_core::model::AttemptEvent;
use mnemo_core::{behavior, efficiency, forecast, mastery, temporal};

fn make_events(n: usize) -> Vec<AttemptEvent> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    (0..n)
        .map(|i| AttemptEvent {
            learner_id: "bench".into(),
            knowledge_unit_id: format!("ku{}", i % 25),
            subject_id: "math".into(),
            is_correct: i % 4 != 0,
            difficulty_tier: (i % 5) as u8 + 1,
            duration_seconds: 20.0 + (i % 40) as f64,
            // a few attempts per session, sessions spread over ~60 days
            occurred_at: start + Duration::minutes((i as i64 / 6) * 1_400 + (i as i64 % 6) * 3),
        })
        .collect()
}

fn bench_mastery(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut group = c.benchmark_group("mastery");
    for n in [100, 1_000, 10_000] {
        let events = make_events(n);
        group.bench_function(format!("estimate_all/{n}"), |b| {
            b.iter(|| mastery::estimate_all(black_box(&events), [], &config.mastery))
        });
    }
    group.finish();
}

fn bench_window(c: &mut Criterion) {
    let config = EngineConfig::default();
    let events = make_events(5_000);
    let mut group = c.benchmark_group("window");

    group.bench_function("efficiency", |b| {
        b.iter(|| efficiency::analyze(black_box(&events), &config))
    });
    group.bench_function("temporal", |b| {
        b.iter(|| temporal::analyze(black_box(&events), &config))
    });

    let sessions = temporal::analyze(&events, &config).sessions;
    group.bench_function("behavior", |b| {
        b.iter(|| behavior::analyze(black_box(&sessions), 60, &config.behavior))
    });

    let daily = efficiency::analyze(&events, &config).daily;
    let as_of = daily.last().map(|d| d.date).unwrap();
    group.bench_function("forecast", |b| {
        b.iter(|| forecast::forecast(black_box(&daily), as_of, 7, &config.forecast))
    });
    group.finish();
}

criterion_group!(benches, bench_mastery, bench_window);
criterion_main!(benches);
