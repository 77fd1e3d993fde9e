//! Ordinary least squares fit of a straight line through arbitrary points

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Fitted line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    slope: f64,
    intercept: f64,
    points: usize,
}

impl LinearFit {
    /// Fit a line through `(x, y)` points.
    ///
    /// Needs at least two points with distinct `x` values.
    pub fn fit(points: &[(f64, f64)]) -> Result<Self> {
        if points.len() < 2 {
            return Err(MathError::InsufficientData(
                "Need at least 2 points for linear regression".to_string(),
            ));
        }

        let n = points.len() as f64;
        let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for &(x, y) in points {
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        if denominator.abs() < 1e-10 {
            return Err(MathError::CalculationError(
                "Cannot calculate slope: x values are too similar".to_string(),
            ));
        }

        let slope = numerator / denominator;
        let intercept = y_mean - slope * x_mean;

        if !slope.is_finite() || !intercept.is_finite() {
            return Err(MathError::CalculationError(
                "Regression produced non-finite parameters".to_string(),
            ));
        }

        Ok(Self {
            slope,
            intercept,
            points: points.len(),
        })
    }

    /// Value of the fitted line at `x`
    pub fn value_at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Residuals `y - fitted(x)` for the given points
    pub fn residuals(&self, points: &[(f64, f64)]) -> Vec<f64> {
        points.iter().map(|&(x, y)| y - self.value_at(x)).collect()
    }

    /// Get the slope (trend direction and strength)
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Get the intercept
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of points the line was fitted on
    pub fn points(&self) -> usize {
        self.points
    }
}
