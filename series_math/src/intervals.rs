//! Uncertainty interval helpers

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided standard-normal quantile for a central interval of `width`.
///
/// `normal_quantile(0.95)` is about `1.96`.
pub fn normal_quantile(width: f64) -> Result<f64> {
    if width <= 0.0 || width >= 1.0 {
        return Err(MathError::InvalidInput(
            "Interval width must be between 0 and 1 (exclusive)".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(e.to_string()))?;

    Ok(normal.inverse_cdf(0.5 + width / 2.0))
}

/// Sample standard deviation of residuals (`n - 1` denominator).
///
/// Returns `0.0` for a single residual.
pub fn residual_std_dev(residuals: &[f64]) -> Result<f64> {
    if residuals.is_empty() {
        return Err(MathError::InsufficientData(
            "No residuals to measure".to_string(),
        ));
    }
    if residuals.len() == 1 {
        return Ok(0.0);
    }

    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let variance = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

    Ok(variance.sqrt())
}

/// Symmetric interval around a point estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub lower: f64,
    pub upper: f64,
}

impl PredictionInterval {
    /// Build `mean ± z * spread`. A negative or non-finite spread is rejected.
    pub fn around(mean: f64, z: f64, spread: f64) -> Result<Self> {
        if !spread.is_finite() || spread < 0.0 || !z.is_finite() || z < 0.0 {
            return Err(MathError::InvalidInput(format!(
                "Invalid interval spread {} or multiplier {}",
                spread, z
            )));
        }

        let margin = z * spread;
        Ok(Self {
            lower: mean - margin,
            upper: mean + margin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_quantile() {
        assert_relative_eq!(normal_quantile(0.95).unwrap(), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(normal_quantile(0.80).unwrap(), 1.281552, epsilon = 1e-5);
        assert!(normal_quantile(1.0).is_err());
        assert!(normal_quantile(0.0).is_err());
    }

    #[test]
    fn test_residual_std_dev() {
        let residuals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(
            residual_std_dev(&residuals).unwrap(),
            2.138090,
            epsilon = 1e-5
        );
        assert_eq!(residual_std_dev(&[3.0]).unwrap(), 0.0);
        assert!(residual_std_dev(&[]).is_err());
    }

    #[test]
    fn test_interval_brackets_mean() {
        let interval = PredictionInterval::around(10.0, 1.96, 2.0).unwrap();
        assert!(interval.lower <= 10.0 && 10.0 <= interval.upper);
        assert_relative_eq!(interval.lower, 6.08, epsilon = 1e-9);
        assert_relative_eq!(interval.upper, 13.92, epsilon = 1e-9);
        assert!(PredictionInterval::around(10.0, 1.96, -1.0).is_err());
    }
}
