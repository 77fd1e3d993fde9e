//! Combine per-metric forecasts into one flat record per series and timestamp

use crate::config::{FieldNames, PartialMetricPolicy};
use crate::data::SeriesKey;
use crate::models::ForecastPoint;
use crate::pipeline::ForecastMap;
use crate::sink::{ColumnValue, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mean and bounds of one metric at one timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricForecast {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl From<ForecastPoint> for MetricForecast {
    fn from(point: ForecastPoint) -> Self {
        Self {
            mean: point.mean,
            lower: point.lower,
            upper: point.upper,
        }
    }
}

/// One output row: a series at one future timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub cohort_id: i64,
    pub sub_cohort_id: String,
    pub date: DateTime<Utc>,
    pub metrics: BTreeMap<String, MetricForecast>,
}

impl PredictionRecord {
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.cohort_id, self.sub_cohort_id.clone())
    }

    /// Flatten into sink columns: the key fields, then `<metric>`,
    /// `<metric>_lower` and `<metric>_upper` for every metric.
    pub fn to_row(&self, fields: &FieldNames) -> Row {
        let mut row = Row::new();
        row.insert(fields.cohort.clone(), ColumnValue::Int(self.cohort_id));
        row.insert(
            fields.sub_cohort.clone(),
            ColumnValue::Text(self.sub_cohort_id.clone()),
        );
        row.insert(fields.timestamp.clone(), ColumnValue::Timestamp(self.date));

        for (metric, forecast) in &self.metrics {
            row.insert(metric.clone(), ColumnValue::Float(forecast.mean));
            row.insert(format!("{}_lower", metric), ColumnValue::Float(forecast.lower));
            row.insert(format!("{}_upper", metric), ColumnValue::Float(forecast.upper));
        }

        row
    }
}

/// Turn the runner's forecast map into prediction records.
///
/// With [`PartialMetricPolicy::DropGroup`] a series contributes records only
/// if every configured metric is present at every timestamp.
pub fn merge_forecasts(
    forecasts: ForecastMap,
    metrics: &[String],
    policy: PartialMetricPolicy,
) -> Vec<PredictionRecord> {
    let incomplete: BTreeSet<SeriesKey> = match policy {
        PartialMetricPolicy::OmitMetric => BTreeSet::new(),
        PartialMetricPolicy::DropGroup => forecasts
            .iter()
            .filter(|(_, by_metric)| metrics.iter().any(|m| !by_metric.contains_key(m)))
            .map(|((key, _), _)| key.clone())
            .collect(),
    };

    for key in &incomplete {
        tracing::info!(
            cohort_id = key.cohort_id,
            sub_cohort_id = %key.sub_cohort_id,
            "dropping series with incomplete metrics"
        );
    }

    forecasts
        .into_iter()
        .filter(|((key, _), _)| !incomplete.contains(key))
        .map(|((key, date), metrics)| PredictionRecord {
            cohort_id: key.cohort_id,
            sub_cohort_id: key.sub_cohort_id,
            date,
            metrics,
        })
        .collect()
}
