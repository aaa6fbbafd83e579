//! Performance forecasting by least-squares extrapolation of the daily
//! series produced by the efficiency analyzer.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::ForecastConfig;
use crate::efficiency::DailyEfficiency;
use crate::model::DataStatus;
use crate::statistics::{linear_regression, LinearFit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Declining => write!(f, "declining"),
            Trend::Stable => write!(f, "stable"),
            Trend::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    AtRisk,
    LowRisk,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::AtRisk => write!(f, "at_risk"),
            RiskLevel::LowRisk => write!(f, "low_risk"),
        }
    }
}

/// Fitted line for one daily series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTrend {
    /// Change per day.
    pub slope: f64,
    pub intercept: f64,
    pub trend: Trend,
    pub r_squared: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub accuracy: SeriesTrend,
    pub study_minutes: SeriesTrend,
    pub efficiency: SeriesTrend,
}

/// Extrapolated values for one future date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrediction {
    pub date: NaiveDate,
    /// 0..=100.
    pub accuracy: f64,
    /// Never negative.
    pub study_minutes: f64,
    /// 0..=100.
    pub efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub data_status: DataStatus,
    /// Headline trend, taken from the accuracy series.
    pub trend: Trend,
    /// 0..=1.
    pub confidence_level: f64,
    pub risk: RiskLevel,
    pub sample_size: usize,
    /// `None` when there were too few points to fit.
    pub series: Option<ForecastSeries>,
    pub predictions: Vec<DailyPrediction>,
}

impl ForecastReport {
    fn insufficient(required: usize, observed: usize) -> Self {
        Self {
            data_status: DataStatus::check(required, observed),
            trend: Trend::InsufficientData,
            confidence_level: 0.0,
            risk: RiskLevel::LowRisk,
            sample_size: observed,
            series: None,
            predictions: Vec::new(),
        }
    }
}

/// Classify a fit by the sign and size of its slope relative to the series mean.
pub fn classify_trend(fit: &LinearFit, threshold: f64) -> Trend {
    let relative = fit.relative_slope();
    if relative > threshold {
        Trend::Improving
    } else if relative < -threshold {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// `min(1, n / full) * (1 - residual_ratio)`, clamped to 0..=1.
pub fn confidence(fit: &LinearFit, full_confidence_points: usize) -> f64 {
    let sample = if full_confidence_points == 0 {
        1.0
    } else {
        (fit.n as f64 / full_confidence_points as f64).min(1.0)
    };
    (sample * (1.0 - fit.residual_ratio)).clamp(0.0, 1.0)
}

pub fn assess_risk(
    trend: Trend,
    confidence: f64,
    latest_accuracy: f64,
    config: &ForecastConfig,
) -> RiskLevel {
    if trend == Trend::Declining
        && confidence >= config.risk_confidence
        && latest_accuracy < config.risk_accuracy
    {
        RiskLevel::AtRisk
    } else {
        RiskLevel::LowRisk
    }
}

fn series_trend(fit: &LinearFit, config: &ForecastConfig) -> SeriesTrend {
    SeriesTrend {
        slope: fit.slope,
        intercept: fit.intercept,
        trend: classify_trend(fit, config.trend_threshold),
        r_squared: fit.r_squared(),
    }
}

/// Forecast `horizon_days` past `as_of` from daily records ordered by date.
pub fn forecast(
    daily: &[DailyEfficiency],
    as_of: NaiveDate,
    horizon_days: u32,
    config: &ForecastConfig,
) -> ForecastReport {
    let required = config.min_points.max(2);
    let Some(first) = daily.first() else {
        return ForecastReport::insufficient(required, 0);
    };
    if daily.len() < required {
        return ForecastReport::insufficient(required, daily.len());
    }

    let offset = |date: NaiveDate| (date - first.date).num_days() as f64;
    let points = |value: fn(&DailyEfficiency) -> f64| -> Vec<(f64, f64)> {
        daily.iter().map(|d| (offset(d.date), value(d))).collect()
    };

    let fits = (
        linear_regression(&points(|d| d.metrics.accuracy)),
        linear_regression(&points(|d| d.metrics.study_seconds / 60.0)),
        linear_regression(&points(|d| d.metrics.score)),
    );
    let (Some(accuracy), Some(study), Some(efficiency)) = fits else {
        return ForecastReport::insufficient(required, daily.len());
    };

    let trend = classify_trend(&accuracy, config.trend_threshold);
    let confidence_level = confidence(&accuracy, config.full_confidence_points);
    let latest_accuracy = daily.last().map_or(0.0, |d| d.metrics.accuracy);

    let predictions = (1..=i64::from(horizon_days))
        .map_while(|k| as_of.checked_add_signed(Duration::days(k)))
        .map(|date| {
            let x = offset(date);
            DailyPrediction {
                date,
                accuracy: accuracy.predict(x).clamp(0.0, 100.0),
                study_minutes: study.predict(x).max(0.0),
                efficiency: efficiency.predict(x).clamp(0.0, 100.0),
            }
        })
        .collect();

    ForecastReport {
        data_status: DataStatus::Sufficient,
        trend,
        confidence_level,
        risk: assess_risk(trend, confidence_level, latest_accuracy, config),
        sample_size: daily.len(),
        series: Some(ForecastSeries {
            accuracy: series_trend(&accuracy, config),
            study_minutes: series_trend(&study, config),
            efficiency: series_trend(&efficiency, config),
        }),
        predictions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efficiency::EfficiencyMetrics;

    fn day(offset: i64, accuracy: f64, minutes: f64) -> DailyEfficiency {
        DailyEfficiency {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(offset),
            metrics: EfficiencyMetrics {
                attempts: 10,
                correct: (accuracy / 10.0) as usize,
                accuracy,
                avg_time_seconds: 30.0,
                target_time_seconds: 30.0,
                speed_factor: 1.0,
                study_seconds: minutes * 60.0,
                score: accuracy,
            },
        }
    }

    fn as_of(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(offset)
    }

    #[test]
    fn four_points_are_not_enough() {
        let daily: Vec<_> = (0..4).map(|i| day(i, 60.0, 20.0)).collect();
        let report = forecast(&daily, as_of(3), 7, &ForecastConfig::default());
        assert_eq!(report.trend, Trend::InsufficientData);
        assert_eq!(report.confidence_level, 0.0);
        assert!(report.predictions.is_empty());
        assert!(report.series.is_none());
        assert_eq!(
            report.data_status,
            DataStatus::InsufficientData {
                required: 5,
                observed: 4
            }
        );
    }

    #[test]
    fn rising_accuracy_is_improving() {
        let daily: Vec<_> = (0..5)
            .map(|i| day(i, 50.0 + 10.0 * i as f64, 20.0))
            .collect();
        let report = forecast(&daily, as_of(4), 3, &ForecastConfig::default());
        assert_eq!(report.trend, Trend::Improving);
        // perfect fit, 5 of 20 points
        assert!((report.confidence_level - 0.25).abs() < 1e-9);
        assert_eq!(report.risk, RiskLevel::LowRisk);
        assert_eq!(report.predictions.len(), 3);
        assert_eq!(report.predictions[0].date, as_of(5));
        assert!((report.predictions[0].accuracy - 100.0).abs() < 1e-9);
        // clamped at the top
        assert_eq!(report.predictions[2].accuracy, 100.0);
        let series = report.series.unwrap();
        assert_eq!(series.study_minutes.trend, Trend::Stable);
        assert!((series.accuracy.slope - 10.0).abs() < 1e-9);
    }

    #[test]
    fn predictions_stop_at_the_last_representable_date() {
        let daily: Vec<_> = (0..5).map(|i| day(i, 60.0, 20.0)).collect();
        let end = NaiveDate::MAX - Duration::days(2);
        let report = forecast(&daily, end, 7, &ForecastConfig::default());
        assert_eq!(report.predictions.len(), 2);
        assert_eq!(report.predictions[1].date, NaiveDate::MAX);
    }

    #[test]
    fn calendar_gaps_are_kept_on_the_x_axis() {
        let daily = vec![
            day(0, 50.0, 10.0),
            day(1, 51.0, 10.0),
            day(2, 52.0, 10.0),
            day(3, 53.0, 10.0),
            day(10, 60.0, 10.0),
        ];
        let report = forecast(&daily, as_of(10), 1, &ForecastConfig::default());
        let series = report.series.unwrap();
        assert!((series.accuracy.slope - 1.0).abs() < 1e-9);
        assert!((series.accuracy.intercept - 50.0).abs() < 1e-9);
    }

    #[test]
    fn confident_decline_with_low_accuracy_is_at_risk() {
        let daily: Vec<_> = (0..20)
            .map(|i| day(i, 80.0 - 3.0 * i as f64, 30.0 - i as f64))
            .collect();
        let report = forecast(&daily, as_of(19), 7, &ForecastConfig::default());
        assert_eq!(report.trend, Trend::Declining);
        assert!((report.confidence_level - 1.0).abs() < 1e-9);
        assert_eq!(report.risk, RiskLevel::AtRisk);
        assert!(report.predictions.iter().all(|p| p.study_minutes >= 0.0));
    }

    #[test]
    fn decline_above_risk_accuracy_is_low_risk() {
        // 100 down to 55 over ten days
        let daily: Vec<_> = (0..10)
            .map(|i| day(i, 100.0 - 5.0 * i as f64, 30.0))
            .collect();
        let report = forecast(&daily, as_of(9), 7, &ForecastConfig::default());
        assert_eq!(report.trend, Trend::Declining);
        assert!((report.confidence_level - 0.5).abs() < 1e-9);
        assert_eq!(report.risk, RiskLevel::LowRisk);
    }

    #[test]
    fn noisy_series_loses_confidence() {
        let values = [60.0, 40.0, 70.0, 35.0, 65.0, 45.0];
        let daily: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| day(i as i64, *v, 20.0))
            .collect();
        let report = forecast(&daily, as_of(5), 7, &ForecastConfig::default());
        assert!(report.confidence_level < 0.3);
        assert!(report.confidence_level >= 0.0);
    }

    #[test]
    fn labels_match_serialized_names() {
        for trend in [
            Trend::Improving,
            Trend::Declining,
            Trend::Stable,
            Trend::InsufficientData,
        ] {
            assert_eq!(serde_json::to_string(&trend).unwrap(), format!("\"{trend}\""));
        }
        for risk in [RiskLevel::AtRisk, RiskLevel::LowRisk] {
            assert_eq!(serde_json::to_string(&risk).unwrap(), format!("\"{risk}\""));
        }
        assert_eq!(Trend::InsufficientData.to_string(), "insufficient_data");
    }
}
