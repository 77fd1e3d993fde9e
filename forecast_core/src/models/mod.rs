//! Forecasting capability consumed by the pipeline

use crate::error::Result;
use crate::frame::TrainingFrame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Prediction for one future timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Fitted model, owned by exactly one (series, metric) unit of work
pub trait FittedModel: Debug + Send {
    /// Predict one point per timestamp, in the same order
    fn predict(&self, timestamps: &[DateTime<Utc>]) -> Result<Vec<ForecastPoint>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be fitted on a training frame
pub trait ForecastModel: Debug + Send + Sync + 'static {
    /// The type of fitted model produced
    type Fitted: FittedModel;

    /// Fit on a frame; fails with fewer than two distinct timestamps
    fn fit(&self, frame: &TrainingFrame) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod linear_trend;

pub use linear_trend::{FittedLinearTrend, LinearTrend};
