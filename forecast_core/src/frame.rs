//! Training frames: the (timestamp, value) pairs one model is fitted on

use crate::error::{ForecastError, Result};
use crate::pipeline::SeriesGroup;
use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;

const TIME_COLUMN: &str = "ds";
const VALUE_COLUMN: &str = "y";

/// Observed values of one metric for one series
#[derive(Debug, Clone)]
pub struct TrainingFrame {
    /// `ds` holds epoch milliseconds, `y` the metric value
    df: DataFrame,
}

impl TrainingFrame {
    /// Create a frame from parallel timestamp and value vectors
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(ForecastError::ValidationError(format!(
                "Timestamps length ({}) doesn't match values length ({})",
                timestamps.len(),
                values.len()
            )));
        }

        let ds = Series::new(
            TIME_COLUMN,
            timestamps
                .iter()
                .map(|t| t.timestamp_millis())
                .collect::<Vec<i64>>(),
        );
        let y = Series::new(VALUE_COLUMN, values);

        Ok(Self {
            df: DataFrame::new(vec![ds, y])?,
        })
    }

    /// Extract the pairs for `metric` from every record of a group
    pub fn from_group(group: &SeriesGroup, metric: &str) -> Result<Self> {
        let mut timestamps = Vec::with_capacity(group.len());
        let mut values = Vec::with_capacity(group.len());

        for record in group.records() {
            let value = record.metric(metric).ok_or_else(|| {
                ForecastError::ValidationError(format!(
                    "Record of {} has no value for metric `{}`",
                    group.key(),
                    metric
                ))
            })?;
            timestamps.push(record.date);
            values.push(value);
        }

        Self::new(timestamps, values)
    }

    /// Drop the upper tail of values above the `q`-th quantile.
    ///
    /// The threshold is computed over this frame alone. Values equal to the
    /// threshold are kept, so a frame of identical values is returned whole.
    pub fn trim_upper_quantile(&self, q: f64) -> Result<Self> {
        if q <= 0.0 || q >= 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Cut quantile must be between 0 and 1 (exclusive), got {}",
                q
            )));
        }
        if self.is_empty() {
            return Ok(self.clone());
        }

        let values = self.values()?;
        let threshold = series_math::quantile(&values, q)?;

        let mask = self.df.column(VALUE_COLUMN)?.f64()?.lt_eq(threshold);
        let df = self.df.filter(&mask)?;

        Ok(Self { df })
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.df.height()
    }

    /// Whether the frame has no observations
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Number of distinct observation timestamps
    pub fn distinct_timestamps(&self) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        Ok(self.df.column(TIME_COLUMN)?.n_unique()?)
    }

    /// Get the values as a vector
    pub fn values(&self) -> Result<Vec<f64>> {
        Ok(self
            .df
            .column(VALUE_COLUMN)?
            .f64()?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Get the timestamps as a vector
    pub fn timestamps(&self) -> Result<Vec<DateTime<Utc>>> {
        self.df
            .column(TIME_COLUMN)?
            .i64()?
            .into_iter()
            .flatten()
            .map(|ms| {
                Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
                    ForecastError::ValidationError(format!("Timestamp {} is out of range", ms))
                })
            })
            .collect()
    }

    /// Observations as (timestamp, value) pairs
    pub fn pairs(&self) -> Result<Vec<(DateTime<Utc>, f64)>> {
        Ok(self.timestamps()?.into_iter().zip(self.values()?).collect())
    }
}
