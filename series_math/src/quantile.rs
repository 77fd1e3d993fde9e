//! Quantile calculation with linear interpolation between order statistics

use crate::{MathError, Result};

/// Calculate the `q`-th quantile of `values`.
///
/// Uses linear interpolation between the two closest order statistics, so
/// `quantile(&[1.0, 2.0, 3.0, 4.0], 0.5)` is `2.5`. `q` must lie in `[0, 1]`
/// and every value must be finite.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate a quantile of an empty set".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Quantile must be between 0 and 1, got {}",
            q
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Quantile input contains non-finite values".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;

    if lower == upper {
        return Ok(sorted[lower]);
    }

    let fraction = position - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}
