//! Small numeric helpers shared by the analyzers.
//!
//! Least-squares fitting follows the textbook closed form; variances are
//! population variances.

use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance, `None` for an empty slice.
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Weighted mean, `None` when the weights sum to zero.
pub fn weighted_mean(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let (num, den) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(n, d), (value, weight)| {
            (n + value * weight, d + weight)
        });
    if den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

/// Correct answers as a percentage of attempts.
pub fn accuracy_percent(correct: usize, attempts: usize) -> Option<f64> {
    if attempts == 0 {
        None
    } else {
        Some(correct as f64 * 100.0 / attempts as f64)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Result of an ordinary least-squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Number of points fitted.
    pub n: usize,
    /// Mean of the observed y values.
    pub mean_y: f64,
    /// Residual sum of squares divided by total sum of squares, in [0, 1].
    /// Zero when y is constant.
    pub residual_ratio: f64,
}

impl LinearFit {
    /// Value of the fitted line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Coefficient of determination.
    pub fn r_squared(&self) -> f64 {
        1.0 - self.residual_ratio
    }

    /// Slope relative to the mean of y. Falls back to the raw slope when the
    /// mean is zero.
    pub fn relative_slope(&self) -> f64 {
        if self.mean_y.abs() > f64::EPSILON {
            self.slope / self.mean_y.abs()
        } else {
            self.slope
        }
    }
}

/// Fit a line through `(x, y)` points. Needs at least two distinct x values.
pub fn linear_regression(points: &[(f64, f64)]) -> Option<LinearFit> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = points.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let residual_ratio = if ss_tot <= f64::EPSILON {
        0.0
    } else {
        (ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        n,
        mean_y,
        residual_ratio,
    })
}
