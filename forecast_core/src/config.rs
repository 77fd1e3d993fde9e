//! Predictor configuration

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What to do with a series when only some of its metrics could be forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialMetricPolicy {
    /// Emit the series with the metrics that succeeded
    #[default]
    OmitMetric,
    /// Emit nothing for a series unless every metric succeeded
    DropGroup,
}

/// Names of the document fields the predictor reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Primary series key (e.g. chat id)
    pub cohort: String,
    /// Secondary series key (e.g. delay bucket)
    pub sub_cohort: String,
    /// Observation timestamp the series is indexed by
    pub timestamp: String,
    /// Load timestamp the source is range-queried on
    pub record_timestamp: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            cohort: "chat_id".to_string(),
            sub_cohort: "delta".to_string(),
            timestamp: "date".to_string(),
            record_timestamp: "loading_date".to_string(),
        }
    }
}

impl FieldNames {
    /// Fields to request from the source for the given metrics
    pub fn projection(&self, metrics: &[String]) -> Vec<String> {
        let mut fields = vec![
            self.cohort.clone(),
            self.sub_cohort.clone(),
            self.timestamp.clone(),
            self.record_timestamp.clone(),
        ];
        fields.extend(metrics.iter().cloned());
        fields
    }
}

/// Tunables of one prediction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Metrics to predict
    pub metrics: Vec<String>,
    /// Minimum records a series needs to be predicted on
    pub minimum_records: usize,
    /// Quantile above which training values are cut as outliers
    pub cut_quantile: f64,
    /// Minutes between two predicted timestamps
    pub step_minutes: u32,
    /// Upper bound on concurrently fitted (series, metric) units
    pub max_workers: usize,
    /// Central coverage of the predicted lower/upper band
    pub interval_width: f64,
    /// Add an hour-of-day profile on top of the trend
    pub daily_seasonality: bool,
    pub partial_metric_policy: PartialMetricPolicy,
    pub fields: FieldNames,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            metrics: vec!["views".to_string()],
            minimum_records: 100,
            cut_quantile: 0.95,
            step_minutes: 5,
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            interval_width: 0.80,
            daily_seasonality: true,
            partial_metric_policy: PartialMetricPolicy::default(),
            fields: FieldNames::default(),
        }
    }
}

impl PredictorConfig {
    /// Check the configuration for values a run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one metric must be configured".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for metric in &self.metrics {
            if metric.trim().is_empty() {
                return Err(ForecastError::InvalidParameter(
                    "Metric names must not be empty".to_string(),
                ));
            }
            if !seen.insert(metric.as_str()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "Metric `{}` is configured twice",
                    metric
                )));
            }
        }

        if self.cut_quantile <= 0.0 || self.cut_quantile >= 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Cut quantile must be between 0 and 1 (exclusive), got {}",
                self.cut_quantile
            )));
        }

        if self.step_minutes == 0 {
            return Err(ForecastError::InvalidParameter(
                "Prediction step must be at least one minute".to_string(),
            ));
        }

        if self.max_workers == 0 {
            return Err(ForecastError::InvalidParameter(
                "At least one worker is required".to_string(),
            ));
        }

        if self.interval_width <= 0.0 || self.interval_width >= 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Interval width must be between 0 and 1 (exclusive), got {}",
                self.interval_width
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PredictorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics, vec!["views".to_string()]);
        assert_eq!(config.minimum_records, 100);
        assert_eq!(config.step_minutes, 5);
        assert_eq!(config.partial_metric_policy, PartialMetricPolicy::OmitMetric);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = PredictorConfig::default();
        config.cut_quantile = 1.0;
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.step_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.metrics = vec!["views".to_string(), "views".to_string()];
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PredictorConfig =
            serde_json::from_str(r#"{"metrics": ["views", "forwards"], "partial_metric_policy": "drop_group"}"#)
                .unwrap();

        assert_eq!(config.metrics.len(), 2);
        assert_eq!(config.cut_quantile, 0.95);
        assert_eq!(config.partial_metric_policy, PartialMetricPolicy::DropGroup);
        assert_eq!(config.fields.cohort, "chat_id");
    }

    #[test]
    fn test_projection_lists_keys_then_metrics() {
        let fields = FieldNames::default();
        let projection = fields.projection(&["views".to_string()]);
        assert_eq!(
            projection,
            vec!["chat_id", "delta", "date", "loading_date", "views"]
        );
    }
}
