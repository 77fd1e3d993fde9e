//! Linear trend with an optional hour-of-day profile

use crate::error::{ForecastError, Result};
use crate::frame::TrainingFrame;
use crate::models::{FittedModel, ForecastModel, ForecastPoint};
use chrono::{DateTime, Timelike, Utc};
use series_math::{normal_quantile, residual_std_dev, LinearFit, PredictionInterval};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Least-squares trend over time, with symmetric normal bands
#[derive(Debug, Clone)]
pub struct LinearTrend {
    name: String,
    /// Central coverage of the lower/upper band
    interval_width: f64,
    daily_seasonality: bool,
}

/// Fitted linear trend
#[derive(Debug, Clone)]
pub struct FittedLinearTrend {
    name: String,
    /// First training timestamp; x is measured in hours from here
    origin: DateTime<Utc>,
    line: LinearFit,
    /// Mean residual per hour of day
    hourly: Option<[f64; 24]>,
    /// Standard deviation of what the trend and profile leave unexplained
    spread: f64,
    z: f64,
}

impl LinearTrend {
    /// Create a new linear trend model
    pub fn new(interval_width: f64) -> Result<Self> {
        if interval_width <= 0.0 || interval_width >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Interval width must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            name: format!("Linear Trend (interval={})", interval_width),
            interval_width,
            daily_seasonality: false,
        })
    }

    /// Enable or disable the hour-of-day profile
    pub fn with_daily_seasonality(mut self, enabled: bool) -> Self {
        self.daily_seasonality = enabled;
        if enabled {
            self.name = format!(
                "Linear Trend + daily profile (interval={})",
                self.interval_width
            );
        }
        self
    }
}

impl ForecastModel for LinearTrend {
    type Fitted = FittedLinearTrend;

    fn fit(&self, frame: &TrainingFrame) -> Result<Self::Fitted> {
        if frame.distinct_timestamps()? < 2 {
            return Err(ForecastError::ModelError(
                "Need at least 2 distinct timestamps to fit a trend".to_string(),
            ));
        }

        let pairs = frame.pairs()?;
        let origin = pairs
            .iter()
            .map(|(t, _)| *t)
            .min()
            .ok_or_else(|| ForecastError::ModelError("Empty training frame".to_string()))?;

        let points: Vec<(f64, f64)> = pairs
            .iter()
            .map(|(t, y)| (hours_since(origin, *t), *y))
            .collect();

        let line = LinearFit::fit(&points)?;
        let mut residuals = line.residuals(&points);

        let hourly = if self.daily_seasonality {
            let profile = hourly_profile(&pairs, &residuals);
            for ((t, _), residual) in pairs.iter().zip(residuals.iter_mut()) {
                *residual -= profile[t.hour() as usize];
            }
            Some(profile)
        } else {
            None
        };

        let spread = residual_std_dev(&residuals)?;
        let z = normal_quantile(self.interval_width)?;

        tracing::trace!(
            slope = line.slope(),
            intercept = line.intercept(),
            points = line.points(),
            spread,
            "fitted linear trend"
        );

        Ok(FittedLinearTrend {
            name: self.name.clone(),
            origin,
            line,
            hourly,
            spread,
            z,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FittedModel for FittedLinearTrend {
    fn predict(&self, timestamps: &[DateTime<Utc>]) -> Result<Vec<ForecastPoint>> {
        timestamps
            .iter()
            .map(|&timestamp| {
                let seasonal = self
                    .hourly
                    .map(|profile| profile[timestamp.hour() as usize])
                    .unwrap_or(0.0);
                let mean = self.line.value_at(hours_since(self.origin, timestamp)) + seasonal;
                if !mean.is_finite() {
                    return Err(ForecastError::ModelError(format!(
                        "Non-finite prediction at {}",
                        timestamp
                    )));
                }

                let interval = PredictionInterval::around(mean, self.z, self.spread)?;
                Ok(ForecastPoint {
                    timestamp,
                    mean,
                    lower: interval.lower,
                    upper: interval.upper,
                })
            })
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn hours_since(origin: DateTime<Utc>, t: DateTime<Utc>) -> f64 {
    (t - origin).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Mean residual per hour of day; hours without observations stay at zero
fn hourly_profile(pairs: &[(DateTime<Utc>, f64)], residuals: &[f64]) -> [f64; 24] {
    let mut sums = [0.0; 24];
    let mut counts = [0usize; 24];

    for ((t, _), residual) in pairs.iter().zip(residuals) {
        let hour = t.hour() as usize;
        sums[hour] += residual;
        counts[hour] += 1;
    }

    let mut profile = [0.0; 24];
    for hour in 0..24 {
        if counts[hour] > 0 {
            profile[hour] = sums[hour] / counts[hour] as f64;
        }
    }
    profile
}
