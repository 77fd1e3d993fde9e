//! Error types for the forecast_core crate

use crate::data::SeriesKey;
use polars::prelude::PolarsError;
use series_math::MathError;
use thiserror::Error;

/// Custom error types for the forecast_core crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A raw record is missing a required field or carries an unusable value
    #[error("Malformed record at index {index}: missing or invalid field `{field}`")]
    MalformedRecord { index: usize, field: String },

    /// Too few usable training points remain for one series and metric
    #[error("Insufficient training data for {key}, metric `{metric}`: {points} usable points")]
    InsufficientTrainingData {
        key: SeriesKey,
        metric: String,
        points: usize,
    },

    /// A series has fewer records than the configured minimum
    #[error("Not enough records for {key}: {count} < {minimum}")]
    InsufficientGroupSize {
        key: SeriesKey,
        count: usize,
        minimum: usize,
    },

    /// An emitted row carries a column the destination table does not have
    #[error("Wrong columns in predictions: `{column}` is not a column of `{table}`")]
    SchemaMismatch { table: String, column: String },

    /// Failure inside the forecasting capability
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to parameter or data validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error reported by the historical data source
    #[error("Source error: {0}")]
    Source(String),

    /// Error reported by the prediction store
    #[error("Sink error: {0}")]
    Sink(String),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before it could produce output
    #[error("Run cancelled")]
    Cancelled,
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}
