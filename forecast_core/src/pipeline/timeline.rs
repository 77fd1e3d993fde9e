//! The evenly spaced future timestamps every series is predicted on

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use std::ops::Deref;
use std::sync::Arc;

/// Strictly increasing timestamps at a fixed step, shared read-only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureTimeline {
    points: Arc<[DateTime<Utc>]>,
}

impl FutureTimeline {
    /// Build the grid from `start` (truncated to the top of its hour) up to
    /// and including the first grid point at or after `end`.
    pub fn build(start: DateTime<Utc>, end: DateTime<Utc>, step_minutes: u32) -> Result<Self> {
        if step_minutes == 0 {
            return Err(ForecastError::InvalidParameter(
                "Prediction step must be at least one minute".to_string(),
            ));
        }

        let origin = truncate_to_hour(start)?;
        let step = Duration::minutes(i64::from(step_minutes));
        let step_ms = step.num_milliseconds();

        let span_ms = (end - origin).num_milliseconds().max(0);
        // ceil(span / step)
        let steps = (span_ms + step_ms - 1) / step_ms;

        let points = (0..=steps)
            .map(|k| origin + Duration::milliseconds(k * step_ms))
            .collect::<Vec<_>>();

        Ok(Self {
            points: points.into(),
        })
    }

    pub fn first(&self) -> DateTime<Utc> {
        self.points[0]
    }

    pub fn last(&self) -> DateTime<Utc> {
        self.points[self.points.len() - 1]
    }

    pub fn as_slice(&self) -> &[DateTime<Utc>] {
        &self.points
    }
}

impl Deref for FutureTimeline {
    type Target = [DateTime<Utc>];

    fn deref(&self) -> &Self::Target {
        &self.points
    }
}

fn truncate_to_hour(t: DateTime<Utc>) -> Result<DateTime<Utc>> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .ok_or_else(|| {
            ForecastError::InvalidParameter(format!("Cannot truncate {} to the hour", t))
        })
}
