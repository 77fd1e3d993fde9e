//! Fit and predict every (series, metric) unit on a bounded worker pool

use crate::data::SeriesKey;
use crate::error::{ForecastError, Result};
use crate::frame::TrainingFrame;
use crate::models::{FittedModel, ForecastModel, ForecastPoint};
use crate::pipeline::merger::MetricForecast;
use crate::pipeline::{FutureTimeline, SeriesGroup};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Per (series, timestamp): the forecast of every metric that succeeded
pub type ForecastMap = BTreeMap<(SeriesKey, DateTime<Utc>), BTreeMap<String, MetricForecast>>;

/// One (series, metric) unit whose output was omitted
#[derive(Debug)]
pub struct UnitFailure {
    pub key: SeriesKey,
    pub metric: String,
    pub error: ForecastError,
}

/// Everything a runner pass produced
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub forecasts: ForecastMap,
    pub failures: Vec<UnitFailure>,
    /// Units that completed successfully
    pub completed: usize,
    /// Set when cancellation stopped units from starting
    pub cancelled: bool,
}

/// Runs the forecasting capability over every surviving series and metric
#[derive(Debug)]
pub struct ForecastRunner<M: ForecastModel> {
    model: Arc<M>,
    metrics: Arc<[String]>,
    cut_quantile: f64,
    max_workers: usize,
}

impl<M: ForecastModel> ForecastRunner<M> {
    pub fn new(model: Arc<M>, metrics: Vec<String>, cut_quantile: f64, max_workers: usize) -> Self {
        Self {
            model,
            metrics: metrics.into(),
            cut_quantile,
            max_workers: max_workers.max(1),
        }
    }

    /// Fit and predict every (group, metric) pair.
    ///
    /// Pairs are independent: a failing pair is logged, recorded in
    /// [`RunOutcome::failures`] and leaves every other pair untouched.
    /// `cancel` is checked before each pair starts; pairs already running
    /// are allowed to finish and their output is kept.
    pub async fn run(
        &self,
        groups: BTreeMap<SeriesKey, SeriesGroup>,
        timeline: &FutureTimeline,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();
        let mut outcome = RunOutcome::default();
        let mut pending: BTreeSet<(SeriesKey, String)> = BTreeSet::new();

        'groups: for (key, group) in groups {
            let group = Arc::new(group);

            for metric in self.metrics.iter() {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        outcome.cancelled = true;
                        break 'groups;
                    }
                    permit = semaphore.clone().acquire_owned() => permit.map_err(|e| {
                        ForecastError::ValidationError(format!("Worker pool closed: {}", e))
                    })?,
                };

                let model = Arc::clone(&self.model);
                let group = Arc::clone(&group);
                let timeline = timeline.clone();
                let metric = metric.clone();
                let key = key.clone();
                let cut_quantile = self.cut_quantile;
                pending.insert((key.clone(), metric.clone()));

                tasks.spawn_blocking(move || {
                    let _permit = permit;
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        forecast_unit(model.as_ref(), &group, &metric, cut_quantile, &timeline)
                    }))
                    .unwrap_or_else(|_| {
                        Err(ForecastError::ModelError(
                            "Forecasting panicked".to_string(),
                        ))
                    });
                    (key, metric, result)
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let (key, metric, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tracing::warn!(error = %err, "forecast worker did not complete");
                    continue;
                }
            };
            pending.remove(&(key.clone(), metric.clone()));

            match result {
                Ok(points) => {
                    outcome.completed += 1;
                    for point in points {
                        outcome
                            .forecasts
                            .entry((key.clone(), point.timestamp))
                            .or_default()
                            .insert(metric.clone(), MetricForecast::from(point));
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        cohort_id = key.cohort_id,
                        sub_cohort_id = %key.sub_cohort_id,
                        metric = %metric,
                        error = %error,
                        "forecast failed, omitting metric for series"
                    );
                    outcome.failures.push(UnitFailure { key, metric, error });
                }
            }
        }

        outcome.failures.extend(unfinished_units(pending));

        if outcome.cancelled {
            tracing::info!(
                completed = outcome.completed,
                failed = outcome.failures.len(),
                "forecast run cancelled before all units started"
            );
        }

        Ok(outcome)
    }
}

/// Failures for units whose worker never reported back
fn unfinished_units(pending: BTreeSet<(SeriesKey, String)>) -> Vec<UnitFailure> {
    pending
        .into_iter()
        .map(|(key, metric)| UnitFailure {
            key,
            metric,
            error: ForecastError::ModelError("Forecast worker did not complete".to_string()),
        })
        .collect()
}

/// Trim, fit and predict one (group, metric) pair
fn forecast_unit<M: ForecastModel>(
    model: &M,
    group: &SeriesGroup,
    metric: &str,
    cut_quantile: f64,
    timeline: &FutureTimeline,
) -> Result<Vec<ForecastPoint>> {
    let frame = TrainingFrame::from_group(group, metric)?.trim_upper_quantile(cut_quantile)?;

    if frame.distinct_timestamps()? < 2 {
        return Err(ForecastError::InsufficientTrainingData {
            key: group.key().clone(),
            metric: metric.to_string(),
            points: frame.len(),
        });
    }

    let fitted = model.fit(&frame)?;
    let points = fitted.predict(timeline.as_slice())?;

    if points.len() != timeline.len() {
        return Err(ForecastError::ModelError(format!(
            "{} returned {} points for {} timestamps",
            fitted.name(),
            points.len(),
            timeline.len()
        )));
    }

    tracing::debug!(
        cohort_id = group.key().cohort_id,
        sub_cohort_id = %group.key().sub_cohort_id,
        metric,
        model = fitted.name(),
        training_points = frame.len(),
        "fitted series"
    );

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfinished_units_become_failures() {
        let pending = BTreeSet::from([
            (SeriesKey::new(2, "5-10m"), "views".to_string()),
            (SeriesKey::new(1, "0-5m"), "forwards".to_string()),
        ]);

        let failures = unfinished_units(pending);

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].key, SeriesKey::new(1, "0-5m"));
        assert_eq!(failures[0].metric, "forwards");
        assert!(failures
            .iter()
            .all(|f| matches!(f.error, ForecastError::ModelError(_))));
    }

    #[test]
    fn test_nothing_pending_adds_no_failures() {
        assert!(unfinished_units(BTreeSet::new()).is_empty());
    }
}
